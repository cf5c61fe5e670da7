//! Error types for tsunameter-transfer.

use thiserror::Error;
use tsunameter_topology::NodeId;

use crate::types::Tag;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Errors that can occur while moving packets.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The destination id is not part of this network.
    #[error("endpoint {0} is not part of this network")]
    UnknownEndpoint(NodeId),

    /// The peer's channel for this tag has been dropped.
    #[error("endpoint {peer} disconnected on {tag} channel")]
    Disconnected { peer: NodeId, tag: Tag },

    /// A payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl TransferError {
    /// Whether this is a delivery gap rather than a local fault.
    pub fn is_delivery_gap(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
