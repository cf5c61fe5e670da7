//! Sensor node.
//!
//! Each sensor runs three cooperating tasks sharing only a node-local
//! termination signal:
//!
//! - the **agent** samples heights, keeps the moving average and runs a
//!   consensus round with its neighbors whenever the average exceeds the
//!   threshold
//! - the **responder** answers neighbor average requests with the latest
//!   average
//! - the **shutdown watcher** waits for the base station's termination message
//!   and raises the local signal

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use tsunameter_consensus::{meets_quorum, round3, similar_count, MovingWindow, WINDOW_SIZE};
use tsunameter_topology::{
    GridCoord, GridTopology, Neighbors, NodeId, BASE_STATION, DIRECTIONS_PER_NODE,
};
use tsunameter_transfer::{Endpoint, Inbox, Outbox, Tag, TransferError};

use crate::clock::Clock;
use crate::record::{AlertRecord, NeighborReport, NeighborSnapshot, SensorReading};
use crate::signal::{StopCause, TerminationSignal};

/// Produces raw water-height samples for one sensor.
pub trait HeightSource: Send + Sync {
    /// Next sample in metres, three decimals.
    fn next_height(&mut self) -> f64;
}

impl<F> HeightSource for F
where
    F: FnMut() -> f64 + Send + Sync,
{
    fn next_height(&mut self) -> f64 {
        self()
    }
}

/// Heights drawn uniformly from a closed range.
pub struct UniformHeights {
    rng: StdRng,
    min: f64,
    max: f64,
}

impl UniformHeights {
    /// Uniform heights in `[min, max]`, seeded for reproducible runs.
    pub fn new(min: f64, max: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, min, max }
    }
}

impl HeightSource for UniformHeights {
    fn next_height(&mut self) -> f64 {
        round3(self.rng.gen_range(self.min..=self.max))
    }
}

/// Tuning for one sensor.
#[derive(Debug, Clone, Copy)]
pub struct SensorParams {
    /// Average above which a consensus round starts
    pub threshold: f64,
    /// Maximum `|local - neighbor|` for a neighbor to agree
    pub height_tolerance: f64,
    /// Pause between sampling cycles
    pub sampling_gap: Duration,
    /// Simulated time to produce one sample
    pub generation_latency: Duration,
}

/// What a sensor did over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReport {
    pub id: NodeId,
    /// Completed sampling cycles after warm-up
    pub cycles: u64,
    pub rounds_started: u64,
    /// Rounds cut short by termination
    pub rounds_abandoned: u64,
    pub alerts_sent: u64,
    /// Average requests answered by the responder
    pub replies_sent: u64,
    /// Messages this endpoint attempted to send, replies included
    pub messages_sent: u64,
    pub cause: Option<StopCause>,
}

enum RoundOutcome {
    Alert(Box<AlertRecord>),
    Declined { similar: usize },
    Abandoned,
}

/// One sensor in the grid.
pub struct SensorNode {
    id: NodeId,
    coord: GridCoord,
    neighbors: Neighbors,
    topology: GridTopology,
    params: SensorParams,
    clock: Clock,
    source: Box<dyn HeightSource>,
    endpoint: Endpoint,
}

impl SensorNode {
    /// Create the sensor owning `endpoint`.
    ///
    /// Returns `None` if the endpoint is not a sensor of `topology`.
    pub fn new(
        endpoint: Endpoint,
        topology: GridTopology,
        params: SensorParams,
        clock: Clock,
        source: Box<dyn HeightSource>,
    ) -> Option<Self> {
        let id = endpoint.id();
        let coord = topology.coord_of(id)?;
        Some(Self {
            id,
            coord,
            neighbors: topology.neighbors(id),
            topology,
            params,
            clock,
            source,
            endpoint,
        })
    }

    /// Run until the base station broadcasts termination.
    pub async fn run(mut self) -> SensorReport {
        let mut report = SensorReport {
            id: self.id,
            cycles: 0,
            rounds_started: 0,
            rounds_abandoned: 0,
            alerts_sent: 0,
            replies_sent: 0,
            messages_sent: 0,
            cause: None,
        };

        let (Some(requests), Some(mut replies), Some(termination)) = (
            self.endpoint.take_inbox(Tag::AverageRequest),
            self.endpoint.take_inbox(Tag::AverageReply),
            self.endpoint.take_inbox(Tag::Termination),
        ) else {
            warn!("Sensor {} inboxes already claimed", self.id);
            return report;
        };
        let outbox = self.endpoint.outbox();
        let signal = TerminationSignal::new();

        let watcher = tokio::spawn(watch_for_shutdown(self.id, termination, signal.clone()));

        let Some(mut window) = self.warm_up(&signal).await else {
            report.cause = signal.cause();
            report.messages_sent = outbox.sent();
            let _ = watcher.await;
            info!("Sensor {} terminated during warm-up", self.id);
            return report;
        };

        let (avg_tx, avg_rx) = watch::channel(window.average());
        let responder = tokio::spawn(respond_to_neighbors(
            self.id,
            requests,
            outbox.clone(),
            avg_rx,
            signal.clone(),
        ));

        debug!("Sensor {} at {} warmed up, average {}", self.id, self.coord, window.average());

        while !signal.is_set() {
            if !signal.sleep(self.params.sampling_gap).await {
                break;
            }
            if !signal.sleep(self.params.generation_latency).await {
                break;
            }

            let reading = SensorReading {
                height: self.source.next_height(),
                taken_at: self.clock.now(),
            };
            let average = window.push(reading.height);
            avg_tx.send_replace(average);
            report.cycles += 1;

            if average <= self.params.threshold || signal.is_set() {
                continue;
            }

            report.rounds_started += 1;
            match self
                .consensus_round(average, report.cycles, &outbox, &mut replies, &signal)
                .await
            {
                RoundOutcome::Alert(alert) => {
                    match outbox.send(Tag::Alert, BASE_STATION, &*alert) {
                        Ok(()) => {
                            report.alerts_sent += 1;
                            debug!(
                                "Sensor {} alert: average {} with {} similar neighbors",
                                self.id, alert.height, alert.similar_count
                            );
                        }
                        Err(e) => send_failed(self.id, "alert", BASE_STATION, &e),
                    }
                }
                RoundOutcome::Declined { similar } => {
                    debug!(
                        "Sensor {} average {} not corroborated ({} similar)",
                        self.id, average, similar
                    );
                }
                RoundOutcome::Abandoned => report.rounds_abandoned += 1,
            }
        }

        report.replies_sent = responder.await.unwrap_or_default();
        report.messages_sent = outbox.sent();
        let _ = watcher.await;
        report.cause = signal.cause();

        info!(
            "Sensor {} terminated after {} cycles ({} alerts sent)",
            self.id, report.cycles, report.alerts_sent
        );
        report
    }

    /// Fill the window with seed samples. `None` if terminated first.
    async fn warm_up(&mut self, signal: &TerminationSignal) -> Option<MovingWindow> {
        let mut seeds = [0.0; WINDOW_SIZE];
        for seed in &mut seeds {
            if !signal.sleep(self.params.generation_latency).await {
                return None;
            }
            *seed = self.source.next_height();
        }
        Some(MovingWindow::seeded(seeds))
    }

    /// Ask every present neighbor for its average and decide whether to
    /// alert.
    async fn consensus_round(
        &self,
        average: f64,
        cycle: u64,
        outbox: &Outbox,
        replies: &mut Inbox,
        signal: &TerminationSignal,
    ) -> RoundOutcome {
        // Replies left over from an earlier round are stale.
        for (_, peer) in self.neighbors.present() {
            while let Ok(Some(_)) = replies.try_recv::<f64>(peer) {}
        }

        let mut messages = 0u32;
        for (_, peer) in self.neighbors.present() {
            if let Err(e) = outbox.send(Tag::AverageRequest, peer, &cycle) {
                send_failed(self.id, "average request", peer, &e);
            }
            // Request plus reply.
            messages += 2;
        }

        let gather = async {
            let mut heights = [None; DIRECTIONS_PER_NODE];
            for (direction, peer) in self.neighbors.present() {
                match replies.recv::<f64>(peer).await {
                    Ok(height) => heights[direction.index()] = Some(height),
                    Err(e) => debug!("Sensor {} no reply from {}: {}", self.id, peer, e),
                }
            }
            heights
        };

        let heights = tokio::select! {
            biased;
            _ = signal.cancelled() => return RoundOutcome::Abandoned,
            heights = gather => heights,
        };

        let alert = build_alert(
            self.id,
            self.coord,
            &self.topology,
            &self.neighbors,
            (average, self.clock.now()),
            heights,
            self.params.height_tolerance,
            messages + AlertRecord::BASE_LEG_MESSAGES,
        );
        let similar = alert.similar_count as usize;
        if !meets_quorum(similar) {
            return RoundOutcome::Declined { similar };
        }
        RoundOutcome::Alert(Box::new(alert))
    }
}

/// Assemble the alert for one round from the neighbor table and replies.
#[allow(clippy::too_many_arguments)]
fn build_alert(
    id: NodeId,
    coord: GridCoord,
    topology: &GridTopology,
    neighbors: &Neighbors,
    (average, reported_at): (f64, DateTime<Utc>),
    heights: [Option<f64>; DIRECTIONS_PER_NODE],
    tolerance: f64,
    message_count: u32,
) -> AlertRecord {
    let mut snapshots = [NeighborSnapshot::Absent; DIRECTIONS_PER_NODE];
    for (direction, peer) in neighbors.present() {
        let slot = direction.index();
        if let (Some(height), Some(peer_coord)) = (heights[slot], topology.coord_of(peer)) {
            snapshots[slot] = NeighborSnapshot::Present(NeighborReport {
                peer,
                coord: peer_coord,
                height,
            });
        }
    }

    let similar = similar_count(average, tolerance, heights.iter().flatten().copied());

    AlertRecord {
        reporter: id,
        coord,
        height: average,
        reported_at,
        neighbors: snapshots,
        similar_count: similar as u32,
        message_count,
    }
}

/// Log a failed send; delivery gaps only at debug level.
fn send_failed(id: NodeId, what: &str, peer: NodeId, err: &TransferError) {
    if err.is_delivery_gap() {
        debug!("Sensor {} {} to {} not delivered: {}", id, what, peer, err);
    } else {
        warn!("Sensor {} could not send {} to {}: {}", id, what, peer, err);
    }
}

/// Answer average requests until termination. Returns replies sent.
async fn respond_to_neighbors(
    id: NodeId,
    mut requests: Inbox,
    outbox: Outbox,
    average: watch::Receiver<f64>,
    signal: TerminationSignal,
) -> u64 {
    let mut replies = 0u64;
    loop {
        let request = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            request = requests.recv_any::<u64>() => request,
        };

        match request {
            Ok((peer, cycle)) => {
                trace!("Sensor {} answering {} for cycle {}", id, peer, cycle);
                let current = *average.borrow();
                match outbox.send(Tag::AverageReply, peer, &current) {
                    Ok(()) => replies += 1,
                    Err(e) => send_failed(id, "average reply", peer, &e),
                }
            }
            Err(e) => {
                debug!("Sensor {} responder stopping: {}", id, e);
                break;
            }
        }
    }
    replies
}

/// Wait for the base station's termination message and raise the local
/// signal.
async fn watch_for_shutdown(id: NodeId, mut termination: Inbox, signal: TerminationSignal) {
    let received = tokio::select! {
        biased;
        _ = signal.cancelled() => return,
        received = termination.recv::<StopCause>(BASE_STATION) => received,
    };

    let cause = match received {
        Ok(cause) => cause,
        Err(e) => {
            warn!("Sensor {} lost contact with base station: {}", id, e);
            StopCause::UserRequested
        }
    };
    debug!("Sensor {} received termination: {}", id, cause);
    signal.trigger(cause);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsunameter_transfer::Network;

    fn params() -> SensorParams {
        SensorParams {
            threshold: 6000.0,
            height_tolerance: 200.0,
            sampling_gap: Duration::from_secs(4),
            generation_latency: Duration::from_secs(1),
        }
    }

    #[test]
    fn uniform_heights_in_range() {
        let mut source = UniformHeights::new(5000.0, 6800.0, Some(3));
        for _ in 0..500 {
            let h = source.next_height();
            assert!((5000.0..=6800.0).contains(&h));
            assert_eq!(h, round3(h));
        }
    }

    #[test]
    fn closures_are_sources() {
        let mut n = 0.0;
        let mut source = move || {
            n += 1.0;
            n
        };
        assert_eq!(HeightSource::next_height(&mut source), 1.0);
        assert_eq!(HeightSource::next_height(&mut source), 2.0);
    }

    #[test]
    fn build_alert_counts_similar_neighbors() {
        let topology = GridTopology::new(3, 3).unwrap();
        let id = NodeId(5);
        let neighbors = topology.neighbors(id);
        let heights = [Some(6050.0), Some(6350.0), Some(5950.0), Some(5800.0)];

        let alert = build_alert(
            id,
            GridCoord::new(1, 1),
            &topology,
            &neighbors,
            (6100.0, Utc::now()),
            heights,
            200.0,
            9,
        );
        assert_eq!(alert.similar_count, 2);
        assert_eq!(alert.present_neighbors().count(), 4);
        let west = alert.neighbors[0].report().unwrap();
        assert_eq!(west.peer, NodeId(4));
        assert_eq!(west.coord, GridCoord::new(1, 0));
    }

    #[test]
    fn build_alert_keeps_absent_slots() {
        let topology = GridTopology::new(2, 2).unwrap();
        let id = NodeId(1);
        let neighbors = topology.neighbors(id);
        // Corner: east and south only.
        let heights = [None, Some(6100.0), None, Some(6120.0)];

        let alert = build_alert(
            id,
            GridCoord::ORIGIN,
            &topology,
            &neighbors,
            (6110.0, Utc::now()),
            heights,
            200.0,
            5,
        );
        assert_eq!(alert.neighbors[0], NeighborSnapshot::Absent);
        assert_eq!(alert.neighbors[2], NeighborSnapshot::Absent);
        assert_eq!(alert.similar_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminates_on_base_station_message() {
        let topology = GridTopology::new(1, 1).unwrap();
        let mut endpoints = Network::build(topology.endpoint_count());
        let sensor_ep = endpoints.pop().unwrap();
        let base = endpoints.pop().unwrap();

        let node = SensorNode::new(
            sensor_ep,
            topology,
            params(),
            Clock::start(),
            Box::new(|| 5500.0),
        )
        .unwrap();
        let handle = tokio::spawn(node.run());

        // Warm-up 4s, then two full cycles of 5s each.
        tokio::time::sleep(Duration::from_millis(14_500)).await;
        base.outbox()
            .send(Tag::Termination, NodeId(1), &StopCause::IterationBudgetExhausted)
            .unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.cycles, 2);
        assert_eq!(report.rounds_started, 0);
        assert_eq!(report.cause, Some(StopCause::IterationBudgetExhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn isolated_sensor_never_alerts() {
        let topology = GridTopology::new(1, 1).unwrap();
        let mut endpoints = Network::build(topology.endpoint_count());
        let sensor_ep = endpoints.pop().unwrap();
        let mut base = endpoints.pop().unwrap();
        let mut alerts = base.take_inbox(Tag::Alert).unwrap();

        let node = SensorNode::new(
            sensor_ep,
            topology,
            params(),
            Clock::start(),
            Box::new(|| 6500.0),
        )
        .unwrap();
        let handle = tokio::spawn(node.run());

        tokio::time::sleep(Duration::from_secs(30)).await;
        base.outbox()
            .send(Tag::Termination, NodeId(1), &StopCause::UserRequested)
            .unwrap();

        let report = handle.await.unwrap();
        assert!(report.rounds_started > 0);
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(alerts.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn corroborated_anomaly_reaches_base_station() {
        // 1x3 row: the middle sensor has two neighbors.
        let topology = GridTopology::new(1, 3).unwrap();
        let mut endpoints = Network::build(topology.endpoint_count());
        let mut base = endpoints.remove(0);
        let mut alerts = base.take_inbox(Tag::Alert).unwrap();

        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|ep| {
                let node = SensorNode::new(
                    ep,
                    topology,
                    params(),
                    Clock::start(),
                    Box::new(|| 6100.0),
                )
                .unwrap();
                tokio::spawn(node.run())
            })
            .collect();

        let (reporter, alert): (NodeId, AlertRecord) = alerts.recv_any().await.unwrap();
        assert_eq!(reporter, alert.reporter);
        assert_eq!(alert.height, 6100.0);
        assert!(alert.similar_count >= 1);

        for sensor in topology.sensors() {
            base.outbox()
                .send(Tag::Termination, sensor, &StopCause::UserRequested)
                .unwrap();
        }
        let mut total_alerts = 0;
        for handle in handles {
            let report = handle.await.unwrap();
            assert_eq!(report.cause, Some(StopCause::UserRequested));
            total_alerts += report.alerts_sent;
        }
        assert!(total_alerts >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn termination_abandons_pending_round() {
        // 1x3 row; only the middle sensor runs, so no neighbor ever replies.
        let topology = GridTopology::new(1, 3).unwrap();
        let mut endpoints = Network::build(topology.endpoint_count());
        let middle = endpoints.remove(2);
        let mut alerts = endpoints[0].take_inbox(Tag::Alert).unwrap();

        let node = SensorNode::new(
            middle,
            topology,
            params(),
            Clock::start(),
            Box::new(|| 6500.0),
        )
        .unwrap();
        let handle = tokio::spawn(node.run());

        // First cycle completes at 9s and the round then waits on replies.
        tokio::time::sleep(Duration::from_secs(20)).await;
        endpoints[0]
            .outbox()
            .send(Tag::Termination, NodeId(2), &StopCause::UserRequested)
            .unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.rounds_started, 1);
        assert_eq!(report.rounds_abandoned, 1);
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(report.messages_sent, 2);
        assert_eq!(report.cause, Some(StopCause::UserRequested));
        assert_eq!(alerts.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn middle_sensor_alert_counts_messages() {
        let topology = GridTopology::new(1, 3).unwrap();
        let mut endpoints = Network::build(topology.endpoint_count());
        let mut base = endpoints.remove(0);
        let mut alerts = base.take_inbox(Tag::Alert).unwrap();

        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|ep| {
                let node = SensorNode::new(
                    ep,
                    topology,
                    params(),
                    Clock::start(),
                    Box::new(|| 6150.0),
                )
                .unwrap();
                tokio::spawn(node.run())
            })
            .collect();

        let alert: AlertRecord = alerts.recv(NodeId(2)).await.unwrap();
        assert_eq!(alert.similar_count, 2);
        assert_eq!(alert.message_count, 5);
        assert_eq!(alert.neighbor_messages(), 4);

        for sensor in topology.sensors() {
            let _ = base
                .outbox()
                .send(Tag::Termination, sensor, &StopCause::UserRequested);
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
