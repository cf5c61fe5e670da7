//! Fixed-shape neighbor tables.
//!
//! Every sensor carries a 4-slot table in west, east, north, south order.
//! Absent directions stay in the table as `None` so message layouts built
//! from it never change shape.

use crate::{Direction, NodeId, DIRECTIONS_PER_NODE};

/// A sensor's axis neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neighbors {
    slots: [Option<NodeId>; DIRECTIONS_PER_NODE],
}

impl Neighbors {
    /// Wrap a raw neighbor table.
    pub const fn new(slots: [Option<NodeId>; DIRECTIONS_PER_NODE]) -> Self {
        Self { slots }
    }

    /// The neighbor in one direction, if present.
    pub fn get(&self, direction: Direction) -> Option<NodeId> {
        self.slots[direction.index()]
    }

    /// The raw table, absent slots included.
    pub const fn slots(&self) -> [Option<NodeId>; DIRECTIONS_PER_NODE] {
        self.slots
    }

    /// Present neighbors with their direction, in table order.
    pub fn present(&self) -> impl Iterator<Item = (Direction, NodeId)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(|dir| self.get(dir).map(|id| (dir, id)))
    }

    /// Number of present neighbors (0..=4).
    pub fn present_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether `id` appears in the table.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains(&Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Neighbors {
        Neighbors::new([None, Some(NodeId(2)), None, Some(NodeId(4))])
    }

    #[test]
    fn present_skips_absent() {
        let present: Vec<_> = sample().present().collect();
        assert_eq!(
            present,
            vec![(Direction::East, NodeId(2)), (Direction::South, NodeId(4))]
        );
    }

    #[test]
    fn slots_keep_shape() {
        assert_eq!(sample().slots().len(), DIRECTIONS_PER_NODE);
        assert_eq!(Neighbors::default().present_count(), 0);
    }

    #[test]
    fn contains_checks_present_only() {
        let n = sample();
        assert!(n.contains(NodeId(2)));
        assert!(!n.contains(NodeId(3)));
    }
}
