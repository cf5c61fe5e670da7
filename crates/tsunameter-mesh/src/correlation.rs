//! Alert / satellite correlation.
//!
//! An alert is matched against satellite readings at the same coordinate
//! whose timestamp lies within the time tolerance. Among qualifying readings
//! the one closest in time wins; on a tie the earliest entry in the scanned
//! slice wins, so the choice is deterministic for a given snapshot.

use chrono::TimeDelta;

use crate::record::{AlertClassification, AlertRecord, SatelliteReading};

/// Match tolerances applied by the base station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Maximum `|satellite - alert|` height for a true alert
    pub height: f64,
    /// Maximum `|satellite - alert|` timestamp distance for a match
    pub time: TimeDelta,
}

impl Tolerances {
    /// Build from a height tolerance and a std duration.
    pub fn new(height: f64, time: std::time::Duration) -> Self {
        Self {
            height,
            time: TimeDelta::from_std(time).unwrap_or(TimeDelta::MAX),
        }
    }
}

/// Result of correlating one alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub classification: AlertClassification,
    /// The selected satellite reading, if any qualified
    pub matched: Option<SatelliteReading>,
}

/// Correlate an alert against a snapshot of satellite readings.
pub fn correlate(
    alert: &AlertRecord,
    readings: &[SatelliteReading],
    tolerances: &Tolerances,
) -> Correlation {
    let matched = readings
        .iter()
        .filter(|r| r.coord == alert.coord)
        .map(|r| (r, (alert.reported_at - r.observed_at).abs()))
        .filter(|&(_, delta)| delta <= tolerances.time)
        .min_by_key(|&(_, delta)| delta)
        .map(|(r, _)| *r);

    let classification = match &matched {
        None => AlertClassification::Unmatched,
        Some(r) if (r.height - alert.height).abs() <= tolerances.height => {
            AlertClassification::MatchedTrue
        }
        Some(_) => AlertClassification::MatchedFalse,
    };

    Correlation {
        classification,
        matched,
    }
}
