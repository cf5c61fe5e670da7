//! Base station aggregator.
//!
//! Every polling interval the station takes at most one pending alert from
//! each sensor, in sensor id order, and cross-checks it against a snapshot of
//! the satellite archive. Outcomes are tallied per sensor and logged. Once
//! the iteration budget is spent, or an external stop arrives, the station
//! broadcasts termination to every sensor and writes the summary.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tsunameter_topology::{GridCoord, GridTopology, NodeId};
use tsunameter_transfer::{Endpoint, Inbox, Outbox, Tag};

use crate::clock::Clock;
use crate::correlation::{correlate, Tolerances};
use crate::error::Result;
use crate::record::{AlertClassification, AlertRecord};
use crate::report::{AlertEntry, LogHeader, LogSink, Summary};
use crate::satellite::SatelliteArchive;
use crate::signal::{StopCause, TerminationSignal};

/// True/false alert counts for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorTally {
    pub sensor: NodeId,
    pub coord: GridCoord,
    pub true_alerts: u64,
    pub false_alerts: u64,
}

/// Per-sensor tallies, zero for every sensor from the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    sensors: BTreeMap<NodeId, SensorTally>,
}

impl Tally {
    pub fn new(topology: &GridTopology) -> Self {
        let sensors = topology
            .sensors()
            .filter_map(|sensor| {
                let coord = topology.coord_of(sensor)?;
                Some((
                    sensor,
                    SensorTally {
                        sensor,
                        coord,
                        true_alerts: 0,
                        false_alerts: 0,
                    },
                ))
            })
            .collect();
        Self { sensors }
    }

    /// Count one classified alert. Unmatched alerts count as false.
    ///
    /// Returns `false` for a sensor outside the grid.
    pub fn record(&mut self, sensor: NodeId, classification: AlertClassification) -> bool {
        let Some(entry) = self.sensors.get_mut(&sensor) else {
            return false;
        };
        if classification.is_true_alert() {
            entry.true_alerts += 1;
        } else {
            entry.false_alerts += 1;
        }
        true
    }

    pub fn get(&self, sensor: NodeId) -> Option<&SensorTally> {
        self.sensors.get(&sensor)
    }

    /// Grand totals as `(true, false)`.
    pub fn totals(&self) -> (u64, u64) {
        self.sensors.values().fold((0, 0), |(t, f), s| {
            (t + s.true_alerts, f + s.false_alerts)
        })
    }

    /// Rows in sensor id order.
    pub fn rows(&self) -> Vec<SensorTally> {
        self.sensors.values().copied().collect()
    }
}

/// Base station tuning.
#[derive(Debug, Clone, Copy)]
pub struct StationParams {
    /// Polling cycles before the station stops on its own
    pub iteration_budget: u64,
    pub polling_interval: Duration,
    pub tolerances: Tolerances,
}

#[derive(Debug, Default)]
struct Totals {
    alerts_received: u64,
    comm_time_secs: f64,
    messages: u64,
}

/// The aggregator owning endpoint 0.
pub struct BaseStation {
    topology: GridTopology,
    params: StationParams,
    clock: Clock,
    archive: SatelliteArchive,
    signal: TerminationSignal,
    outbox: Outbox,
    alerts: Inbox,
    sink: Box<dyn LogSink>,
}

impl BaseStation {
    /// Create the station. Returns `None` if the alert inbox was already
    /// claimed.
    pub fn new(
        mut endpoint: Endpoint,
        topology: GridTopology,
        params: StationParams,
        clock: Clock,
        archive: SatelliteArchive,
        signal: TerminationSignal,
        sink: Box<dyn LogSink>,
    ) -> Option<Self> {
        let alerts = endpoint.take_inbox(Tag::Alert)?;
        Some(Self {
            topology,
            params,
            clock,
            archive,
            signal,
            outbox: endpoint.outbox(),
            alerts,
            sink,
        })
    }

    /// Poll until termination, then notify every sensor and write the
    /// summary.
    pub async fn run(mut self) -> Result<Summary> {
        let header = LogHeader {
            started_at: self.clock.now(),
            rows: self.topology.rows(),
            cols: self.topology.cols(),
            height_tolerance: self.params.tolerances.height,
            time_tolerance_secs: self.params.tolerances.time.num_milliseconds() as f64 / 1000.0,
            iteration_budget: self.params.iteration_budget,
        };
        if let Err(e) = self.sink.header(&header) {
            self.signal.trigger(StopCause::UserRequested);
            self.broadcast_termination(StopCause::UserRequested);
            return Err(e);
        }

        info!(
            "Base station polling {} sensors every {:?} for {} iterations",
            self.topology.sensor_count(),
            self.params.polling_interval,
            self.params.iteration_budget
        );

        let mut tally = Tally::new(&self.topology);
        let mut totals = Totals::default();
        let mut completed = 0u64;

        let cause = loop {
            if let Some(cause) = self.signal.cause() {
                break cause;
            }
            if !self.signal.sleep(self.params.polling_interval).await {
                continue;
            }

            completed += 1;
            self.poll(completed, &mut tally, &mut totals).await;

            if completed >= self.params.iteration_budget {
                self.signal.trigger(StopCause::IterationBudgetExhausted);
            }
        };

        info!("Base station stopping after {} iterations: {}", completed, cause);
        self.broadcast_termination(cause);

        let (total_true, total_false) = tally.totals();
        let summary = Summary {
            finished_at: self.clock.now(),
            cause,
            iterations: completed,
            iteration_budget: self.params.iteration_budget,
            per_sensor: tally.rows(),
            total_true,
            total_false,
            alerts_received: totals.alerts_received,
            total_comm_time_secs: totals.comm_time_secs,
            total_messages: totals.messages,
        };
        self.sink.summary(&summary)?;
        Ok(summary)
    }

    /// One polling cycle: at most one alert per sensor.
    async fn poll(&mut self, iteration: u64, tally: &mut Tally, totals: &mut Totals) {
        let mut pending = Vec::new();
        for sensor in self.topology.sensors() {
            match self.alerts.try_recv::<AlertRecord>(sensor) {
                Ok(Some(alert)) => pending.push((sensor, alert)),
                Ok(None) => {}
                Err(e) => warn!("Base station dropped alert from {}: {}", sensor, e),
            }
        }

        if pending.is_empty() {
            debug!("Iteration {}: no alerts", iteration);
            return;
        }

        let readings = self.archive.snapshot().await;
        for (sensor, alert) in pending {
            let correlation = correlate(&alert, &readings, &self.params.tolerances);
            tally.record(sensor, correlation.classification);

            let logged_at = self.clock.now();
            let latency_secs =
                (logged_at - alert.reported_at).abs().num_milliseconds() as f64 / 1000.0;
            totals.alerts_received += 1;
            totals.comm_time_secs += latency_secs;
            totals.messages += u64::from(alert.message_count);

            debug!(
                "Iteration {}: alert from {} at {} classified {:?}",
                iteration, sensor, alert.coord, correlation.classification
            );

            let entry = AlertEntry {
                iteration,
                logged_at,
                alert,
                classification: correlation.classification,
                satellite: correlation.matched,
                latency_secs,
            };
            if let Err(e) = self.sink.alert(&entry) {
                warn!("Failed to log alert from {}: {}", sensor, e);
            }
        }
    }

    fn broadcast_termination(&self, cause: StopCause) {
        for sensor in self.topology.sensors() {
            if let Err(e) = self.outbox.send(Tag::Termination, sensor, &cause) {
                warn!("Termination to {} not delivered: {}", sensor, e);
            }
        }
    }
}
