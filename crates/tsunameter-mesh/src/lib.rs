//! Tsunameter Mesh - distributed tsunami detection simulation
//!
//! A grid of sensor nodes smooths noisy water-height readings, corroborates
//! anomalies with immediate neighbors, and escalates validated anomalies to a
//! base station. The base station cross-checks every alert against an
//! independently produced stream of satellite altimetry and tallies the
//! outcome per sensor.
//!
//! # Architecture
//!
//! - **Sensor nodes**: sampling loop, neighbor responder and shutdown watcher
//!   per node, sharing only a node-local termination signal
//! - **Satellite feed**: background producer filling a fixed-capacity ring
//!   buffer at the base station
//! - **Base station**: polls sensors for alerts, correlates them against the
//!   ring buffer, logs each outcome and broadcasts termination
//! - **Transport**: tagged point-to-point channels from `tsunameter-transfer`
//!
//! # Example
//!
//! ```no_run
//! use tsunameter_mesh::{FileLog, Mesh, MeshConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MeshConfig::default();
//!     let sink = FileLog::open(&config.log_path, config.log_format)?;
//!     let report = Mesh::new(config)?.run(Box::new(sink)).await?;
//!     println!("{} true alerts", report.summary.total_true);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod correlation;
pub mod error;
pub mod mesh;
pub mod record;
pub mod report;
pub mod satellite;
pub mod sensor;
pub mod sentinel;
pub mod signal;
pub mod station;

pub use clock::Clock;
pub use config::{LogFormat, MeshConfig, Timing};
pub use correlation::{correlate, Correlation, Tolerances};
pub use error::{Error, Result};
pub use mesh::{Mesh, RunReport};
pub use record::{
    AlertClassification, AlertRecord, NeighborReport, NeighborSnapshot, SatelliteReading,
    SensorReading,
};
pub use report::{AlertEntry, FileLog, LogEntry, LogHeader, LogSink, MemoryLog, Summary};
pub use satellite::{RingBuffer, SatelliteArchive, SatelliteFeed, SATELLITE_CAPACITY};
pub use sensor::{HeightSource, SensorNode, SensorParams, SensorReport, UniformHeights};
pub use sentinel::{parse_sentinel, watch_sentinel_file, SentinelState};
pub use signal::{StopCause, TerminationSignal};
pub use station::{BaseStation, SensorTally, StationParams, Tally};
