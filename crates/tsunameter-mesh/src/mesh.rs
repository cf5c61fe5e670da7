//! Run orchestration.
//!
//! Wires one in-process network: endpoint 0 is the base station, endpoints
//! `1..=rows*cols` are sensors. The satellite feed, the stop sentinel and
//! the station share the base-side [`TerminationSignal`]; each sensor only
//! learns about termination from the station's broadcast.

use tracing::{info, warn};
use tsunameter_topology::{GridTopology, NodeId};
use tsunameter_transfer::Network;

use crate::clock::Clock;
use crate::config::MeshConfig;
use crate::correlation::Tolerances;
use crate::error::{Error, Result};
use crate::report::{LogSink, Summary};
use crate::satellite::{SatelliteArchive, SatelliteFeed, SATELLITE_CAPACITY};
use crate::sensor::{HeightSource, SensorNode, SensorParams, SensorReport, UniformHeights};
use crate::sentinel::watch_sentinel_file;
use crate::signal::TerminationSignal;
use crate::station::{BaseStation, StationParams};

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: Summary,
    /// One report per sensor, in id order
    pub sensors: Vec<SensorReport>,
    /// Satellite readings produced over the run
    pub satellite_readings: u64,
}

/// A configured sensor mesh, ready to run once.
pub struct Mesh {
    config: MeshConfig,
    topology: GridTopology,
    signal: TerminationSignal,
}

impl Mesh {
    /// Validate `config` and lay out the grid.
    pub fn new(config: MeshConfig) -> Result<Self> {
        config.validate()?;
        let topology = GridTopology::for_workers(config.rows, config.cols, config.workers())?;
        Ok(Self {
            config,
            topology,
            signal: TerminationSignal::new(),
        })
    }

    pub fn topology(&self) -> &GridTopology {
        &self.topology
    }

    /// Handle for stopping the run from outside (Ctrl-C, tests).
    pub fn stop_handle(&self) -> TerminationSignal {
        self.signal.clone()
    }

    /// Run with uniformly random sensor heights.
    pub async fn run(self, sink: Box<dyn LogSink>) -> Result<RunReport> {
        let (min, max, seed) = (self.config.min_height, self.config.max_height, self.config.seed);
        self.run_with(sink, move |id| {
            Box::new(UniformHeights::new(
                min,
                max,
                seed.map(|s| s.wrapping_add(u64::from(id.0))),
            ))
        })
        .await
    }

    /// Run with a caller-chosen height source per sensor.
    pub async fn run_with<F>(self, sink: Box<dyn LogSink>, mut sources: F) -> Result<RunReport>
    where
        F: FnMut(NodeId) -> Box<dyn HeightSource>,
    {
        let Self {
            config,
            topology,
            signal,
        } = self;
        let clock = Clock::start();
        let timing = config.timing;

        info!(
            "Starting mesh: {}x{} grid, {} sensors, base station budget {}",
            topology.rows(),
            topology.cols(),
            topology.sensor_count(),
            config.base_iterations
        );

        let mut endpoints = Network::build(topology.endpoint_count()).into_iter();
        let Some(base) = endpoints.next() else {
            return Err(Error::config("network has no base station endpoint"));
        };

        let sensor_params = SensorParams {
            threshold: config.threshold,
            height_tolerance: config.height_tolerance,
            sampling_gap: timing.sampling_gap,
            generation_latency: timing.generation_latency,
        };
        let mut sensors = Vec::with_capacity(topology.sensor_count());
        for endpoint in endpoints {
            let id = endpoint.id();
            match SensorNode::new(endpoint, topology, sensor_params, clock, sources(id)) {
                Some(node) => sensors.push(tokio::spawn(node.run())),
                None => warn!("Endpoint {} is not a sensor of this grid", id),
            }
        }

        let archive = SatelliteArchive::new(SATELLITE_CAPACITY);
        let feed = SatelliteFeed::new(
            archive.clone(),
            topology,
            (config.threshold.min(config.max_height), config.max_height),
            timing.satellite_interval,
            clock,
            config.seed,
        );
        let feed = tokio::spawn(feed.run(signal.clone()));

        let sentinel = config.sentinel_path.clone().map(|path| {
            tokio::spawn(watch_sentinel_file(
                path,
                timing.sentinel_interval,
                signal.clone(),
            ))
        });

        let station = BaseStation::new(
            base,
            topology,
            StationParams {
                iteration_budget: config.base_iterations,
                polling_interval: timing.polling_interval,
                tolerances: Tolerances::new(config.height_tolerance, config.time_tolerance),
            },
            clock,
            archive,
            signal.clone(),
            sink,
        )
        .ok_or_else(|| Error::config("base station alert inbox unavailable"))?;
        let summary = station.run().await;

        let mut reports = Vec::with_capacity(sensors.len());
        for handle in sensors {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Sensor task failed: {}", e),
            }
        }
        let satellite_readings = feed.await.unwrap_or_default();
        if let Some(sentinel) = sentinel {
            let _ = sentinel.await;
        }

        let summary = summary?;
        info!(
            "Mesh finished ({}): {} true / {} false alerts",
            summary.cause, summary.total_true, summary.total_false
        );
        Ok(RunReport {
            summary,
            sensors: reports,
            satellite_readings,
        })
    }
}
