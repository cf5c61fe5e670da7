//! Error types for the tsunameter mesh.

use thiserror::Error;

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a run.
///
/// In-protocol anomalies (missing neighbor replies, unmatched alerts) are
/// never errors; they are absorbed into the data model and show up in the
/// log only.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Grid does not fit the available workers
    #[error("Topology error: {0}")]
    Topology(#[from] tsunameter_topology::TopologyError),

    /// Transport failure outside the protocol's tolerance
    #[error("Transport error: {0}")]
    Transfer(#[from] tsunameter_transfer::TransferError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
