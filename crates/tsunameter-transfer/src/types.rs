//! Core types for the tsunameter transport

use std::fmt;

use serde::{Deserialize, Serialize};
use tsunameter_topology::NodeId;

/// Per-sender sequence number
pub type SeqNo = u64;

/// Logical message channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Alerting sensor asks a neighbor for its current average
    AverageRequest,
    /// Neighbor answers with its current average
    AverageReply,
    /// Sensor escalates a corroborated alert to the base station
    Alert,
    /// Base station tells a sensor to stop
    Termination,
}

impl Tag {
    /// All tags, in channel-index order.
    pub const ALL: [Self; 4] = [
        Self::AverageRequest,
        Self::AverageReply,
        Self::Alert,
        Self::Termination,
    ];

    /// Channel index of this tag.
    pub const fn index(self) -> usize {
        match self {
            Self::AverageRequest => 0,
            Self::AverageReply => 1,
            Self::Alert => 2,
            Self::Termination => 3,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AverageRequest => write!(f, "average-request"),
            Self::AverageReply => write!(f, "average-reply"),
            Self::Alert => write!(f, "alert"),
            Self::Termination => write!(f, "termination"),
        }
    }
}

/// Packet header carrying routing and sequencing information
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Logical channel
    pub tag: Tag,
    /// Sending endpoint
    pub source: NodeId,
    /// Receiving endpoint
    pub dest: NodeId,
    /// Sender-local sequence number
    pub seq: SeqNo,
}

/// Complete packet with header and encoded body
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Packet {
    /// Packet header
    pub hdr: PacketHeader,
    /// bincode-encoded payload
    pub body: bytes::Bytes,
}

impl Packet {
    /// Encode a payload into a packet.
    pub fn encode<T: Serialize>(hdr: PacketHeader, payload: &T) -> crate::Result<Self> {
        let body = bincode::serialize(payload)?;
        Ok(Self {
            hdr,
            body: bytes::Bytes::from(body),
        })
    }

    /// Decode the payload.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(bincode::deserialize(&self.body)?)
    }

    /// Sending endpoint.
    pub fn source(&self) -> NodeId {
        self.hdr.source
    }

    /// Logical channel.
    pub fn tag(&self) -> Tag {
        self.hdr.tag
    }
}
