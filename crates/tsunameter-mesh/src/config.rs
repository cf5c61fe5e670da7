//! Run configuration.
//!
//! All parameters are validated once, before any sensor or station starts;
//! the core only ever sees a valid, immutable [`MeshConfig`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Default lower bound for generated water heights (m).
pub const MIN_WATER_HEIGHT: f64 = 5000.0;
/// Default upper bound for generated water heights (m).
pub const MAX_WATER_HEIGHT: f64 = 6800.0;
/// Default alert threshold (m).
pub const WATER_THRESHOLD: f64 = 6000.0;
/// Default tolerance for two heights to count as similar (m).
pub const HEIGHT_TOLERANCE: f64 = 200.0;
/// Default tolerance between alert and satellite timestamps.
pub const TIME_TOLERANCE: Duration = Duration::from_secs(10);
/// Thresholds outside this band fall back to [`WATER_THRESHOLD`].
pub const RECOMMENDED_THRESHOLD: std::ops::RangeInclusive<f64> = 6000.0..=6500.0;

/// Format of the alert log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable blocks
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!("unknown log format {other:?}"))),
        }
    }
}

/// Simulation cadence.
///
/// These model acquisition and polling latency; they are simulation
/// parameters, not correctness requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Gap between two sampling cycles
    pub sampling_gap: Duration,
    /// Time taken to produce one reading
    pub generation_latency: Duration,
    /// Base station polling interval
    pub polling_interval: Duration,
    /// Interval between satellite readings
    pub satellite_interval: Duration,
    /// Interval between stop-sentinel checks
    pub sentinel_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sampling_gap: Duration::from_secs(4),
            generation_latency: Duration::from_secs(1),
            polling_interval: Duration::from_secs(4),
            satellite_interval: Duration::from_secs(1),
            sentinel_interval: Duration::from_secs(1),
        }
    }
}

/// Configuration for a mesh run.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Grid rows
    pub rows: u32,
    /// Grid columns
    pub cols: u32,
    /// Sensor workers available; must equal `rows * cols` when set
    pub workers: Option<u64>,
    /// Polling cycles the base station runs before stopping
    pub base_iterations: u64,
    /// Lower bound for generated heights
    pub min_height: f64,
    /// Upper bound for generated heights
    pub max_height: f64,
    /// Averages above this start a consensus round
    pub threshold: f64,
    /// Similarity / satellite match tolerance for heights
    pub height_tolerance: f64,
    /// Satellite match tolerance for timestamps
    pub time_tolerance: Duration,
    /// Simulation cadence
    pub timing: Timing,
    /// File polled for the external stop sentinel
    pub sentinel_path: Option<PathBuf>,
    /// Alert log destination
    pub log_path: PathBuf,
    /// Alert log format
    pub log_format: LogFormat,
    /// Seed for reproducible readings
    pub seed: Option<u64>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            workers: None,
            base_iterations: 10,
            min_height: MIN_WATER_HEIGHT,
            max_height: MAX_WATER_HEIGHT,
            threshold: WATER_THRESHOLD,
            height_tolerance: HEIGHT_TOLERANCE,
            time_tolerance: TIME_TOLERANCE,
            timing: Timing::default(),
            sentinel_path: Some(PathBuf::from("use.txt")),
            log_path: PathBuf::from("logs.txt"),
            log_format: LogFormat::Text,
            seed: None,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    env_parse(key, default.as_millis() as u64).map(Duration::from_millis)
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    let secs: f64 = env_parse(key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).map_err(|e| Error::config(format!("{key}={secs}: {e}")))
}

impl MeshConfig {
    /// Build a config from `TSUNAMETER_*` environment variables.
    ///
    /// Unset variables keep their defaults. Non-numeric values are
    /// configuration errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let timing = Timing {
            sampling_gap: env_millis("TSUNAMETER_SAMPLING_GAP_MS", defaults.timing.sampling_gap)?,
            generation_latency: env_millis(
                "TSUNAMETER_GENERATION_LATENCY_MS",
                defaults.timing.generation_latency,
            )?,
            polling_interval: env_millis(
                "TSUNAMETER_POLLING_INTERVAL_MS",
                defaults.timing.polling_interval,
            )?,
            satellite_interval: env_millis(
                "TSUNAMETER_SATELLITE_INTERVAL_MS",
                defaults.timing.satellite_interval,
            )?,
            sentinel_interval: env_millis(
                "TSUNAMETER_SENTINEL_INTERVAL_MS",
                defaults.timing.sentinel_interval,
            )?,
        };

        let sentinel_path = match env_var("TSUNAMETER_SENTINEL") {
            Some(path) if path == "none" => None,
            Some(path) => Some(PathBuf::from(path)),
            None => defaults.sentinel_path,
        };

        let seed = match env_var("TSUNAMETER_SEED") {
            Some(_) => Some(env_parse("TSUNAMETER_SEED", 0u64)?),
            None => None,
        };
        let workers = match env_var("TSUNAMETER_WORKERS") {
            Some(_) => Some(env_parse("TSUNAMETER_WORKERS", 0u64)?),
            None => None,
        };

        let config = Self {
            rows: env_parse("TSUNAMETER_ROWS", defaults.rows)?,
            cols: env_parse("TSUNAMETER_COLS", defaults.cols)?,
            workers,
            base_iterations: env_parse("TSUNAMETER_BASE_ITERATIONS", defaults.base_iterations)?,
            min_height: env_parse("TSUNAMETER_MIN_HEIGHT", defaults.min_height)?,
            max_height: env_parse("TSUNAMETER_MAX_HEIGHT", defaults.max_height)?,
            threshold: Self::recommended_threshold(env_parse(
                "TSUNAMETER_THRESHOLD",
                defaults.threshold,
            )?),
            height_tolerance: env_parse("TSUNAMETER_HEIGHT_TOLERANCE", defaults.height_tolerance)?,
            time_tolerance: env_secs("TSUNAMETER_TIME_TOLERANCE_SECS", defaults.time_tolerance)?,
            timing,
            sentinel_path,
            log_path: env_var("TSUNAMETER_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
            log_format: env_parse("TSUNAMETER_LOG_FORMAT", defaults.log_format)?,
            seed,
        };

        config.validate()?;
        Ok(config)
    }

    /// Clamp an operator-supplied threshold to the recommended band.
    ///
    /// Values outside [`RECOMMENDED_THRESHOLD`] are replaced by
    /// [`WATER_THRESHOLD`] with a warning.
    pub fn recommended_threshold(value: f64) -> f64 {
        if RECOMMENDED_THRESHOLD.contains(&value) {
            value
        } else {
            warn!(
                requested = value,
                fallback = WATER_THRESHOLD,
                "Water threshold outside recommended range, using default"
            );
            WATER_THRESHOLD
        }
    }

    /// Number of sensor workers the grid must cover.
    pub fn workers(&self) -> u64 {
        self.workers
            .unwrap_or(u64::from(self.rows) * u64::from(self.cols))
    }

    /// Check every parameter. Called by [`MeshConfig::from_env`] and
    /// [`crate::Mesh::new`].
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.base_iterations == 0 {
            return Err(Error::config("base station iteration budget must be positive"));
        }
        if !(self.min_height.is_finite() && self.max_height.is_finite()) {
            return Err(Error::config("height range must be finite"));
        }
        if self.min_height >= self.max_height {
            return Err(Error::config(format!(
                "min height {} must be below max height {}",
                self.min_height, self.max_height
            )));
        }
        if !self.threshold.is_finite() {
            return Err(Error::config("threshold must be finite"));
        }
        if !(self.height_tolerance.is_finite() && self.height_tolerance >= 0.0) {
            return Err(Error::config("height tolerance must be a non-negative number"));
        }
        let timing = &self.timing;
        for (name, value) in [
            ("sampling gap", timing.sampling_gap),
            ("generation latency", timing.generation_latency),
            ("polling interval", timing.polling_interval),
            ("satellite interval", timing.satellite_interval),
            ("sentinel interval", timing.sentinel_interval),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}
