//! Neighbor similarity and the escalation quorum.

/// Minimum number of similar neighbors before an alert escalates.
pub const CONSENSUS_QUORUM: usize = 2;

/// Whether a peer height lies within `[local - tolerance, local + tolerance]`.
pub fn is_similar(local: f64, peer: f64, tolerance: f64) -> bool {
    peer >= local - tolerance && peer <= local + tolerance
}

/// Count peer heights similar to `local`.
///
/// Only heights actually received are passed in; absent neighbors are never
/// counted.
pub fn similar_count<I>(local: f64, tolerance: f64, peers: I) -> usize
where
    I: IntoIterator<Item = f64>,
{
    peers
        .into_iter()
        .filter(|&peer| is_similar(local, peer, tolerance))
        .count()
}

/// Check if a similar-neighbor count is enough to escalate.
pub const fn meets_quorum(similar: usize) -> bool {
    similar >= CONSENSUS_QUORUM
}
