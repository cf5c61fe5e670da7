//! Simulation clock.
//!
//! Wall-clock timestamps anchored once at start-up and advanced by
//! `tokio::time`, so every node in one run shares a consistent notion of
//! "now" and paused-time tests move timestamps forward deterministically.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Shared source of timestamps.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    /// Anchor at the current wall-clock time.
    pub fn start() -> Self {
        Self::anchored(Utc::now())
    }

    /// Anchor at a fixed wall-clock time.
    pub fn anchored(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            origin: Instant::now(),
        }
    }

    /// Current timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::zero());
        self.anchor + elapsed
    }
}
