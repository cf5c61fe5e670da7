//! Records exchanged between sensors, the satellite feed and the base station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tsunameter_topology::{GridCoord, NodeId, DIRECTIONS_PER_NODE};

/// One raw height sample taken by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub height: f64,
    pub taken_at: DateTime<Utc>,
}

/// A neighbor's contribution to a consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighborReport {
    pub peer: NodeId,
    pub coord: GridCoord,
    /// The neighbor's moving average when it answered
    pub height: f64,
}

/// One direction of a neighbor table as seen during a consensus round.
///
/// Absent directions stay in the table so every alert has the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum NeighborSnapshot {
    /// No neighbor in this direction
    #[default]
    Absent,
    /// Neighbor answered with its average
    Present(NeighborReport),
}

impl NeighborSnapshot {
    /// The report, if the neighbor is present.
    pub fn report(&self) -> Option<&NeighborReport> {
        match self {
            Self::Absent => None,
            Self::Present(report) => Some(report),
        }
    }
}

/// A corroborated anomaly, sent once from a sensor to the base station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub reporter: NodeId,
    pub coord: GridCoord,
    /// The reporter's moving average at alert time
    pub height: f64,
    pub reported_at: DateTime<Utc>,
    /// West, east, north, south
    pub neighbors: [NeighborSnapshot; DIRECTIONS_PER_NODE],
    /// Neighbors whose height fell within tolerance of `height`
    pub similar_count: u32,
    /// Messages spent producing this alert, the alert itself included
    pub message_count: u32,
}

impl AlertRecord {
    /// Messages on the sensor-to-base leg (always the single alert).
    pub const BASE_LEG_MESSAGES: u32 = 1;

    /// Messages exchanged with neighbors for this alert.
    pub fn neighbor_messages(&self) -> u32 {
        self.message_count.saturating_sub(Self::BASE_LEG_MESSAGES)
    }

    /// Neighbors that took part in the round.
    pub fn present_neighbors(&self) -> impl Iterator<Item = &NeighborReport> {
        self.neighbors.iter().filter_map(NeighborSnapshot::report)
    }
}

/// An independent height observation from satellite altimetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteReading {
    pub coord: GridCoord,
    pub height: f64,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of cross-checking an alert against satellite readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertClassification {
    /// Satellite reading found and heights agree
    MatchedTrue,
    /// Satellite reading found but heights disagree
    MatchedFalse,
    /// No satellite reading at that coordinate within the time window
    Unmatched,
}

impl AlertClassification {
    /// Whether the alert counts as a true alert in the tally.
    pub fn is_true_alert(self) -> bool {
        self == Self::MatchedTrue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> AlertRecord {
        AlertRecord {
            reporter: NodeId(5),
            coord: GridCoord::new(1, 1),
            height: 6100.0,
            reported_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            neighbors: [
                NeighborSnapshot::Present(NeighborReport {
                    peer: NodeId(4),
                    coord: GridCoord::new(1, 0),
                    height: 6050.0,
                }),
                NeighborSnapshot::Absent,
                NeighborSnapshot::Present(NeighborReport {
                    peer: NodeId(2),
                    coord: GridCoord::new(0, 1),
                    height: 5950.0,
                }),
                NeighborSnapshot::Absent,
            ],
            similar_count: 2,
            message_count: 5,
        }
    }

    #[test]
    fn neighbor_leg_excludes_alert_send() {
        assert_eq!(alert().neighbor_messages(), 4);
    }

    #[test]
    fn absent_slots_are_kept() {
        let record = alert();
        assert_eq!(record.neighbors.len(), DIRECTIONS_PER_NODE);
        let peers: Vec<_> = record.present_neighbors().map(|n| n.peer).collect();
        assert_eq!(peers, vec![NodeId(4), NodeId(2)]);
    }

    #[test]
    fn classification_tally_rules() {
        assert!(AlertClassification::MatchedTrue.is_true_alert());
        assert!(!AlertClassification::MatchedFalse.is_true_alert());
        assert!(!AlertClassification::Unmatched.is_true_alert());
    }

    #[test]
    fn alert_survives_wire_encoding() {
        use tsunameter_topology::BASE_STATION;
        use tsunameter_transfer::{Packet, PacketHeader, Tag};

        let record = alert();
        let hdr = PacketHeader {
            tag: Tag::Alert,
            source: record.reporter,
            dest: BASE_STATION,
            seq: 0,
        };
        let packet = Packet::encode(hdr, &record).unwrap();
        assert_eq!(packet.decode::<AlertRecord>().unwrap(), record);
    }
}
