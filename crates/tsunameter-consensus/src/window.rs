//! Fixed-size sliding window average.
//!
//! The window always holds exactly [`WINDOW_SIZE`] samples; it must be
//! seeded before the first decision. Each new sample overwrites the oldest
//! slot and the oldest index advances modulo the window size.
//!
//! The running sum is kept in integer thousandths. Samples are rounded to
//! 3 decimals on entry, so `sum - evicted + new` is exact and the reported
//! average is always the mean of the last 4 samples, rounded to 3 decimals,
//! no matter how many updates came before.

/// Number of samples in the window.
pub const WINDOW_SIZE: usize = 4;

/// Round to 3 decimal places, half away from zero.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn to_millis(value: f64) -> i64 {
    (value * 1000.0).round() as i64
}

fn mean_of_millis(sum: i64) -> f64 {
    (sum as f64 / WINDOW_SIZE as f64).round() / 1000.0
}

/// A 4-slot circular window of recent heights.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingWindow {
    samples: [i64; WINDOW_SIZE],
    sum: i64,
    oldest: usize,
    average: f64,
}

impl MovingWindow {
    /// Build a window from its first 4 samples.
    ///
    /// Slot 0 becomes the oldest sample.
    pub fn seeded(initial: [f64; WINDOW_SIZE]) -> Self {
        let samples = initial.map(to_millis);
        let sum = samples.iter().sum();
        Self {
            samples,
            sum,
            oldest: 0,
            average: mean_of_millis(sum),
        }
    }

    /// Fold a new sample in, evicting the oldest, and return the new average.
    pub fn push(&mut self, sample: f64) -> f64 {
        let incoming = to_millis(sample);
        let evicted = self.samples[self.oldest];
        self.sum = self.sum - evicted + incoming;
        self.samples[self.oldest] = incoming;
        self.oldest = (self.oldest + 1) % WINDOW_SIZE;
        self.average = mean_of_millis(self.sum);
        self.average
    }

    /// Current average, rounded to 3 decimals.
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Slot index that the next sample will overwrite.
    pub fn oldest(&self) -> usize {
        self.oldest
    }

    /// Window contents in slot order (not age order).
    pub fn samples(&self) -> [f64; WINDOW_SIZE] {
        self.samples.map(|m| m as f64 / 1000.0)
    }
}
