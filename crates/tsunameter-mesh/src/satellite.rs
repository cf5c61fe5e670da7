//! Satellite altimetry feed.
//!
//! A background producer appends synthetic readings at random grid
//! coordinates into a fixed-capacity ring buffer. The base station reads the
//! buffer during correlation: it copies the populated entries under the lock
//! and scans the copy after releasing it, so the writer is never held up by a
//! scan and the scan never sees a half-written entry.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};
use tsunameter_consensus::round3;
use tsunameter_topology::{GridCoord, GridTopology};

use crate::clock::Clock;
use crate::record::SatelliteReading;
use crate::signal::TerminationSignal;

/// Number of readings the base station retains.
pub const SATELLITE_CAPACITY: usize = 100;

/// Fixed-capacity buffer that overwrites its oldest entry once full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    next: usize,
    total: u64,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            total: 0,
        }
    }

    /// Append, overwriting the oldest entry when full.
    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.next] = item;
        }
        self.next = (self.next + 1) % self.capacity;
        self.total += 1;
    }

    /// Populated entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever appended, overwritten ones included.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Copy of the populated entries, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        if self.slots.len() < self.capacity {
            return self.slots.clone();
        }
        let (newer, older) = self.slots.split_at(self.next);
        older.iter().chain(newer).cloned().collect()
    }
}

/// Ring buffer of satellite readings shared by the feed and the base station.
#[derive(Debug, Clone)]
pub struct SatelliteArchive {
    inner: Arc<Mutex<RingBuffer<SatelliteReading>>>,
}

impl Default for SatelliteArchive {
    fn default() -> Self {
        Self::new(SATELLITE_CAPACITY)
    }
}

impl SatelliteArchive {
    /// Create an empty archive.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    /// Append one reading under exclusive access.
    pub async fn append(&self, reading: SatelliteReading) {
        self.inner.lock().await.push(reading);
    }

    /// Copy the populated readings, oldest first. The lock is held only for
    /// the copy.
    pub async fn snapshot(&self) -> Vec<SatelliteReading> {
        self.inner.lock().await.snapshot()
    }
}

/// Background producer of synthetic satellite readings.
pub struct SatelliteFeed {
    archive: SatelliteArchive,
    topology: GridTopology,
    min_height: f64,
    max_height: f64,
    interval: Duration,
    clock: Clock,
    rng: StdRng,
}

impl SatelliteFeed {
    /// Create a feed writing into `archive`.
    ///
    /// Heights are drawn uniformly from `[min_height, max_height]`.
    pub fn new(
        archive: SatelliteArchive,
        topology: GridTopology,
        (min_height, max_height): (f64, f64),
        interval: Duration,
        clock: Clock,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            archive,
            topology,
            min_height,
            max_height,
            interval,
            clock,
            rng,
        }
    }

    /// Produce one reading at a random coordinate.
    pub fn observe(&mut self) -> SatelliteReading {
        let coord = GridCoord::new(
            self.rng.gen_range(0..self.topology.rows()),
            self.rng.gen_range(0..self.topology.cols()),
        );
        let height = round3(self.rng.gen_range(self.min_height..=self.max_height));
        SatelliteReading {
            coord,
            height,
            observed_at: self.clock.now(),
        }
    }

    /// Append a reading every interval until termination. Returns the number
    /// of readings produced.
    pub async fn run(mut self, signal: TerminationSignal) -> u64 {
        info!(interval = ?self.interval, "Satellite feed started");
        let mut produced = 0u64;
        while !signal.is_set() {
            let reading = self.observe();
            debug!(coord = %reading.coord, height = reading.height, "Satellite reading");
            self.archive.append(reading).await;
            produced += 1;

            if !signal.sleep(self.interval).await {
                break;
            }
        }
        info!(produced, "Satellite feed stopped");
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::StopCause;

    #[test]
    fn ring_fills_in_order() {
        let mut ring = RingBuffer::new(3);
        assert!(ring.is_empty());
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.snapshot(), vec![1, 2]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut ring = RingBuffer::new(3);
        for i in 1..=5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.total(), 5);
        assert_eq!(ring.snapshot(), vec![3, 4, 5]);
    }

    #[test]
    fn only_latest_hundred_retained() {
        let mut ring = RingBuffer::new(SATELLITE_CAPACITY);
        for i in 0..150u32 {
            ring.push(i);
        }
        let kept = ring.snapshot();
        assert_eq!(kept.len(), 100);
        assert_eq!(kept.first(), Some(&50));
        assert_eq!(kept.last(), Some(&149));
        assert!(kept.iter().all(|&i| i >= 50));
        assert_eq!(ring.total(), 150);
    }

    #[test]
    fn zero_capacity_bumped() {
        let mut ring = RingBuffer::new(0);
        ring.push('a');
        ring.push('b');
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.snapshot(), vec!['b']);
    }

    #[test]
    fn observations_stay_in_bounds() {
        let topology = GridTopology::new(2, 3).unwrap();
        let mut feed = SatelliteFeed::new(
            SatelliteArchive::default(),
            topology,
            (6000.0, 6800.0),
            Duration::from_secs(1),
            Clock::start(),
            Some(7),
        );
        for _ in 0..200 {
            let r = feed.observe();
            assert!(r.coord.row < 2 && r.coord.col < 3);
            assert!((6000.0..=6800.0).contains(&r.height));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn feed_stops_on_signal() {
        let archive = SatelliteArchive::default();
        let feed = SatelliteFeed::new(
            archive.clone(),
            GridTopology::new(3, 3).unwrap(),
            (6000.0, 6800.0),
            Duration::from_secs(1),
            Clock::start(),
            Some(1),
        );
        let signal = TerminationSignal::new();
        let handle = tokio::spawn(feed.run(signal.clone()));

        tokio::time::sleep(Duration::from_millis(4500)).await;
        signal.trigger(StopCause::UserRequested);
        let produced = handle.await.unwrap();

        // Readings at t = 0, 1, 2, 3, 4
        assert_eq!(produced, 5);
        assert_eq!(archive.snapshot().await.len(), 5);
    }
}
