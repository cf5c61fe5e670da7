//! In-process endpoint mesh
//!
//! Every endpoint owns one unbounded channel per [`Tag`]. Any endpoint can
//! send to any other through its [`Outbox`]. On the receiving side each
//! per-tag [`Inbox`] is handed to exactly one task, which matches packets by
//! source the way a tagged receive does:
//! - `probe` / `try_recv` never wait
//! - `recv` waits for a packet from one specific source
//! - `recv_any` waits for the next packet from anyone
//!
//! Packets that arrive from other sources while a task waits on one source
//! are parked per source, so nothing is lost or reordered within a source.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tsunameter_topology::NodeId;

use crate::error::{Result, TransferError};
use crate::types::{Packet, PacketHeader, Tag};

type Channels = [UnboundedSender<Packet>; 4];

/// Builder for a fully connected set of endpoints.
pub struct Network;

impl Network {
    /// Create `endpoints` connected endpoints with ids `0..endpoints`.
    pub fn build(endpoints: usize) -> Vec<Endpoint> {
        let mut senders: Vec<Channels> = Vec::with_capacity(endpoints);
        let mut receivers = Vec::with_capacity(endpoints);

        for _ in 0..endpoints {
            let mut rx = Vec::with_capacity(Tag::ALL.len());
            let tx: Channels = std::array::from_fn(|_| {
                let (tx, inbound) = mpsc::unbounded_channel::<Packet>();
                rx.push(inbound);
                tx
            });
            senders.push(tx);
            receivers.push(rx);
        }

        let senders = Arc::new(senders);
        tracing::debug!(endpoints, "built in-process transport");

        receivers
            .into_iter()
            .enumerate()
            .map(|(i, rx)| {
                let id = NodeId(i as u32);
                let mut inboxes = rx
                    .into_iter()
                    .zip(Tag::ALL)
                    .map(|(rx, tag)| Some(Inbox::new(id, tag, rx)));
                let inboxes = std::array::from_fn(|_| inboxes.next().flatten());
                Endpoint {
                    id,
                    outbox: Outbox {
                        source: id,
                        peers: Arc::clone(&senders),
                        seq: Arc::new(AtomicU64::new(0)),
                    },
                    inboxes,
                }
            })
            .collect()
    }
}

/// One endpoint: a sending handle plus its not-yet-claimed inboxes.
pub struct Endpoint {
    id: NodeId,
    outbox: Outbox,
    inboxes: [Option<Inbox>; 4],
}

impl Endpoint {
    /// This endpoint's identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// A sending handle. Clones share the sequence counter.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Claim the inbox for one tag. Returns `None` if already claimed.
    pub fn take_inbox(&mut self, tag: Tag) -> Option<Inbox> {
        self.inboxes[tag.index()].take()
    }
}

/// Cloneable sending half of an endpoint.
#[derive(Clone)]
pub struct Outbox {
    source: NodeId,
    peers: Arc<Vec<Channels>>,
    seq: Arc<AtomicU64>,
}

impl Outbox {
    /// The sending endpoint.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Total packets sent through this endpoint.
    pub fn sent(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// Encode `payload` and deliver it to `dest` on channel `tag`.
    pub fn send<T: Serialize>(&self, tag: Tag, dest: NodeId, payload: &T) -> Result<()> {
        let channels = self
            .peers
            .get(dest.0 as usize)
            .ok_or(TransferError::UnknownEndpoint(dest))?;

        let hdr = PacketHeader {
            tag,
            source: self.source,
            dest,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        let packet = Packet::encode(hdr, payload)?;

        tracing::trace!(%tag, source = %self.source, %dest, bytes = packet.body.len(), "send");

        channels[tag.index()]
            .send(packet)
            .map_err(|_| TransferError::Disconnected { peer: dest, tag })
    }
}

/// Receiving half for one tag on one endpoint.
pub struct Inbox {
    owner: NodeId,
    tag: Tag,
    rx: UnboundedReceiver<Packet>,
    parked: BTreeMap<NodeId, VecDeque<Packet>>,
}

impl Inbox {
    fn new(owner: NodeId, tag: Tag, rx: UnboundedReceiver<Packet>) -> Self {
        Self {
            owner,
            tag,
            rx,
            parked: BTreeMap::new(),
        }
    }

    fn park(&mut self, packet: Packet) {
        self.parked
            .entry(packet.source())
            .or_default()
            .push_back(packet);
    }

    /// Move everything already delivered into the per-source queues.
    fn drain(&mut self) {
        while let Ok(packet) = self.rx.try_recv() {
            self.park(packet);
        }
    }

    fn pop(&mut self, source: NodeId) -> Option<Packet> {
        self.parked.get_mut(&source)?.pop_front()
    }

    fn pop_any(&mut self) -> Option<Packet> {
        self.parked.values_mut().find_map(VecDeque::pop_front)
    }

    /// Whether a packet from `source` is waiting. Never blocks.
    pub fn probe(&mut self, source: NodeId) -> bool {
        self.drain();
        self.parked.get(&source).is_some_and(|q| !q.is_empty())
    }

    /// Number of packets waiting across all sources.
    pub fn pending(&mut self) -> usize {
        self.drain();
        self.parked.values().map(VecDeque::len).sum()
    }

    /// Take the next packet from `source` if one is waiting. Never blocks.
    pub fn try_recv<T: DeserializeOwned>(&mut self, source: NodeId) -> Result<Option<T>> {
        self.drain();
        self.pop(source).map(|p| p.decode()).transpose()
    }

    /// Wait for the next packet from `source`.
    ///
    /// Cancel-safe: dropping the future never loses a packet.
    pub async fn recv<T: DeserializeOwned>(&mut self, source: NodeId) -> Result<T> {
        loop {
            if let Some(packet) = self.pop(source) {
                return packet.decode();
            }
            match self.rx.recv().await {
                Some(packet) => self.park(packet),
                None => {
                    return Err(TransferError::Disconnected {
                        peer: source,
                        tag: self.tag,
                    })
                }
            }
        }
    }

    /// Wait for the next packet from any source.
    ///
    /// Parked packets are served first, lowest source id first.
    pub async fn recv_any<T: DeserializeOwned>(&mut self) -> Result<(NodeId, T)> {
        self.drain();
        if let Some(packet) = self.pop_any() {
            return Ok((packet.source(), packet.decode()?));
        }
        match self.rx.recv().await {
            Some(packet) => Ok((packet.source(), packet.decode()?)),
            None => Err(TransferError::Disconnected {
                peer: self.owner,
                tag: self.tag,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn pair() -> (Endpoint, Endpoint) {
        let mut endpoints = Network::build(2);
        let b = endpoints.pop().unwrap();
        let a = endpoints.pop().unwrap();
        (a, b)
    }

    #[test]
    fn test_endpoint_ids() {
        let endpoints = Network::build(3);
        let ids: Vec<_> = endpoints.iter().map(Endpoint::id).collect();
        assert_eq!(ids, vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_inbox_claimed_once() {
        let (mut a, _) = pair();
        assert!(a.take_inbox(Tag::Alert).is_some());
        assert!(a.take_inbox(Tag::Alert).is_none());
        assert!(a.take_inbox(Tag::Termination).is_some());
    }

    #[test]
    fn test_unknown_destination() {
        let (a, _) = pair();
        let err = a.outbox().send(Tag::Alert, NodeId(9), &1u32).unwrap_err();
        assert!(matches!(err, TransferError::UnknownEndpoint(NodeId(9))));
    }

    #[test]
    fn test_probe_and_try_recv() {
        let (a, mut b) = pair();
        let mut inbox = b.take_inbox(Tag::AverageReply).unwrap();

        assert!(!inbox.probe(NodeId(0)));
        assert_eq!(inbox.try_recv::<f64>(NodeId(0)).unwrap(), None);

        a.outbox().send(Tag::AverageReply, NodeId(1), &6001.5f64).unwrap();
        assert!(inbox.probe(NodeId(0)));
        assert!(!inbox.probe(NodeId(1)));
        assert_eq!(inbox.try_recv::<f64>(NodeId(0)).unwrap(), Some(6001.5));
        assert!(!inbox.probe(NodeId(0)));
    }

    #[test]
    fn test_tags_never_mix() {
        let (a, mut b) = pair();
        let mut replies = b.take_inbox(Tag::AverageReply).unwrap();
        let mut alerts = b.take_inbox(Tag::Alert).unwrap();

        a.outbox().send(Tag::Alert, NodeId(1), &7u32).unwrap();
        assert!(!replies.probe(NodeId(0)));
        assert!(alerts.probe(NodeId(0)));
    }

    #[test]
    fn test_fifo_per_source() {
        let (a, mut b) = pair();
        let mut inbox = b.take_inbox(Tag::AverageRequest).unwrap();
        let out = a.outbox();
        for cycle in 0..5u64 {
            out.send(Tag::AverageRequest, NodeId(1), &cycle).unwrap();
        }
        assert_eq!(out.sent(), 5);
        assert_eq!(inbox.pending(), 5);
        for cycle in 0..5u64 {
            assert_eq!(inbox.try_recv::<u64>(NodeId(0)).unwrap(), Some(cycle));
        }
    }

    #[test]
    fn test_recv_waits_for_source() {
        let mut endpoints = Network::build(3);
        let mut c = endpoints.pop().unwrap();
        let b = endpoints.pop().unwrap();
        let a = endpoints.pop().unwrap();
        let mut inbox = c.take_inbox(Tag::AverageReply).unwrap();

        {
            let mut waiting = task::spawn(inbox.recv::<f64>(NodeId(1)));
            assert_pending!(waiting.poll());

            // A packet from another source is parked, not returned.
            a.outbox().send(Tag::AverageReply, NodeId(2), &1.0f64).unwrap();
            assert_pending!(waiting.poll());

            b.outbox().send(Tag::AverageReply, NodeId(2), &2.0f64).unwrap();
            assert!(waiting.is_woken());
            let value = assert_ready!(waiting.poll()).unwrap();
            assert_eq!(value, 2.0);
        }

        assert_eq!(inbox.try_recv::<f64>(NodeId(0)).unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_recv_any_prefers_parked() {
        let mut endpoints = Network::build(3);
        let mut c = endpoints.pop().unwrap();
        let b = endpoints.pop().unwrap();
        let a = endpoints.pop().unwrap();
        let mut inbox = c.take_inbox(Tag::AverageRequest).unwrap();

        b.outbox().send(Tag::AverageRequest, NodeId(2), &11u64).unwrap();
        a.outbox().send(Tag::AverageRequest, NodeId(2), &10u64).unwrap();
        assert_eq!(inbox.pending(), 2);

        let first: (NodeId, u64) = inbox.recv_any().await.unwrap();
        let second: (NodeId, u64) = inbox.recv_any().await.unwrap();
        assert_eq!(first, (NodeId(0), 10));
        assert_eq!(second, (NodeId(1), 11));
    }

    #[test]
    fn test_send_to_dropped_inbox_is_gap() {
        let (a, mut b) = pair();
        drop(b.take_inbox(Tag::Termination));
        let err = a
            .outbox()
            .send(Tag::Termination, NodeId(1), &0u8)
            .unwrap_err();
        assert!(err.is_delivery_gap());
    }
}
