//! Local Smoothing and Neighbor Consensus
//!
//! A sensor never escalates a single noisy reading. Two filters stand
//! between a raw sample and an alert:
//!
//! 1. **Smoothing**: readings feed a 4-slot sliding window and only the
//!    window average is compared against the alert threshold.
//! 2. **Corroboration**: an over-threshold average is checked against the
//!    averages of the sensor's present grid neighbors. Neighbors within
//!    `± tolerance` count as similar; the alert escalates only when at
//!    least [`CONSENSUS_QUORUM`] neighbors agree.
//!
//! Absent neighbors (grid edges) never count toward the quorum, so a corner
//! sensor needs both of its neighbors to agree.

mod quorum;
mod window;

pub use quorum::{is_similar, meets_quorum, similar_count, CONSENSUS_QUORUM};
pub use window::{round3, MovingWindow, WINDOW_SIZE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothed_alert_needs_two_neighbors() {
        let mut window = MovingWindow::seeded([6000.0, 6100.0, 6200.0, 6100.0]);
        let avg = window.push(6000.0);
        assert_eq!(avg, 6100.0);

        let peers = [Some(6050.0), Some(6350.0), None, Some(5950.0)];
        let count = similar_count(avg, 200.0, peers.iter().flatten().copied());
        assert_eq!(count, 2);
        assert!(meets_quorum(count));
    }
}
