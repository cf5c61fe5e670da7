//! Tsunameter Transfer - tagged point-to-point transport
//!
//! This crate provides:
//! - One logical channel per message kind ([`Tag`]), never mixed
//! - Non-blocking probe and receive per `(tag, source)` pair
//! - Blocking receive once a caller decides to wait
//! - bincode-framed packets so every payload crosses the wire as bytes
//!
//! # Design Philosophy
//!
//! Delivery is best-effort but non-corrupting. A send to an endpoint that has
//! already shut down reports [`TransferError::Disconnected`]; protocol code
//! treats that as a delivery gap, never as a crash. Messages from one source
//! on one tag arrive in send order. Nothing orders messages across sources.
//!
//! # Example
//!
//! ```rust,ignore
//! use tsunameter_transfer::{Network, Tag};
//! use tsunameter_topology::NodeId;
//!
//! let mut endpoints = Network::build(2);
//! let mut bob = endpoints.pop().unwrap();
//! let alice = endpoints.pop().unwrap();
//!
//! alice.outbox().send(Tag::AverageReply, NodeId(1), &6100.25f64)?;
//! let mut replies = bob.take_inbox(Tag::AverageReply).unwrap();
//! let avg: f64 = replies.recv(NodeId(0)).await?;
//! ```

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Result, TransferError};
pub use transport::{Endpoint, Inbox, Network, Outbox};
pub use types::{Packet, PacketHeader, SeqNo, Tag};
