//! Rank and coordinate assignment for the sensor grid.

use std::fmt;

use thiserror::Error;

use crate::{Direction, GridCoord, Neighbors, DIRECTIONS_PER_NODE};

/// Identity of a transport endpoint (base station or sensor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// The base station always owns endpoint 0.
pub const BASE_STATION: NodeId = NodeId(0);

impl NodeId {
    /// Whether this is the base station endpoint.
    pub const fn is_base_station(self) -> bool {
        self.0 == BASE_STATION.0
    }

    /// Zero-based sensor rank, or `None` for the base station.
    pub const fn sensor_rank(self) -> Option<u32> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while building a grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// One of the grid dimensions is zero.
    #[error("grid dimensions must be positive, got {rows}x{cols}")]
    EmptyGrid { rows: u32, cols: u32 },

    /// The grid does not cover exactly the available sensor workers.
    #[error("grid {rows}x{cols} = {cells} cells does not match {workers} sensor workers")]
    WorkerMismatch {
        rows: u32,
        cols: u32,
        cells: u64,
        workers: u64,
    },
}

/// A `rows × cols` Cartesian sensor grid without wrap-around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridTopology {
    rows: u32,
    cols: u32,
}

impl GridTopology {
    /// Create a grid. Both dimensions must be positive.
    pub fn new(rows: u32, cols: u32) -> crate::Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(TopologyError::EmptyGrid { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    /// Create a grid that must cover exactly `workers` sensors.
    pub fn for_workers(rows: u32, cols: u32, workers: u64) -> crate::Result<Self> {
        let grid = Self::new(rows, cols)?;
        let cells = grid.sensor_count() as u64;
        if cells != workers {
            return Err(TopologyError::WorkerMismatch {
                rows,
                cols,
                cells,
                workers,
            });
        }
        Ok(grid)
    }

    /// Number of rows.
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns.
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of sensors on the grid.
    pub const fn sensor_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Number of transport endpoints (sensors plus the base station).
    pub const fn endpoint_count(&self) -> usize {
        self.sensor_count() + 1
    }

    /// All sensor identities in increasing order.
    pub fn sensors(&self) -> impl Iterator<Item = NodeId> {
        (1..=self.sensor_count() as u32).map(NodeId)
    }

    /// Whether `id` names a sensor on this grid.
    pub fn contains(&self, id: NodeId) -> bool {
        id.sensor_rank()
            .is_some_and(|rank| (rank as usize) < self.sensor_count())
    }

    /// Coordinate of a sensor, or `None` for the base station or an unknown id.
    pub fn coord_of(&self, id: NodeId) -> Option<GridCoord> {
        if !self.contains(id) {
            return None;
        }
        let rank = id.sensor_rank()?;
        Some(GridCoord::new(rank / self.cols, rank % self.cols))
    }

    /// The sensor at a coordinate, or `None` when it lies outside the grid.
    pub fn node_at(&self, coord: GridCoord) -> Option<NodeId> {
        (coord.row < self.rows && coord.col < self.cols)
            .then(|| NodeId(coord.row * self.cols + coord.col + 1))
    }

    /// Neighbor table of a sensor in west, east, north, south order.
    ///
    /// Directions that fall off the grid are `None`. Unknown ids get an
    /// all-absent table.
    pub fn neighbors(&self, id: NodeId) -> Neighbors {
        let mut slots = [None; DIRECTIONS_PER_NODE];
        if let Some(coord) = self.coord_of(id) {
            for dir in Direction::ALL {
                slots[dir.index()] = coord
                    .step(dir, self.rows, self.cols)
                    .and_then(|c| self.node_at(c));
            }
        }
        Neighbors::new(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_grid() {
        assert_eq!(
            GridTopology::new(0, 4),
            Err(TopologyError::EmptyGrid { rows: 0, cols: 4 })
        );
        assert!(GridTopology::new(3, 0).is_err());
    }

    #[test]
    fn rejects_worker_mismatch() {
        let err = GridTopology::for_workers(3, 3, 8).unwrap_err();
        assert_eq!(
            err,
            TopologyError::WorkerMismatch {
                rows: 3,
                cols: 3,
                cells: 9,
                workers: 8
            }
        );
        assert!(GridTopology::for_workers(2, 4, 8).is_ok());
    }

    #[test]
    fn row_major_layout() {
        let grid = GridTopology::new(2, 3).unwrap();
        assert_eq!(grid.coord_of(NodeId(1)), Some(GridCoord::new(0, 0)));
        assert_eq!(grid.coord_of(NodeId(3)), Some(GridCoord::new(0, 2)));
        assert_eq!(grid.coord_of(NodeId(4)), Some(GridCoord::new(1, 0)));
        assert_eq!(grid.coord_of(NodeId(6)), Some(GridCoord::new(1, 2)));
        assert_eq!(grid.coord_of(NodeId(7)), None);
        assert_eq!(grid.coord_of(BASE_STATION), None);
    }

    #[test]
    fn coord_round_trip() {
        let grid = GridTopology::new(4, 5).unwrap();
        for id in grid.sensors() {
            let coord = grid.coord_of(id).unwrap();
            assert_eq!(grid.node_at(coord), Some(id));
        }
    }

    #[test]
    fn sensors_are_ordered() {
        let grid = GridTopology::new(2, 2).unwrap();
        let ids: Vec<_> = grid.sensors().collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(grid.endpoint_count(), 5);
    }

    #[test]
    fn corner_has_two_neighbors() {
        let grid = GridTopology::new(3, 3).unwrap();
        let n = grid.neighbors(NodeId(1));
        assert_eq!(n.get(Direction::West), None);
        assert_eq!(n.get(Direction::East), Some(NodeId(2)));
        assert_eq!(n.get(Direction::North), None);
        assert_eq!(n.get(Direction::South), Some(NodeId(4)));
        assert_eq!(n.present_count(), 2);
    }

    #[test]
    fn center_has_four_neighbors() {
        let grid = GridTopology::new(3, 3).unwrap();
        let n = grid.neighbors(NodeId(5));
        assert_eq!(
            n.slots(),
            [Some(NodeId(4)), Some(NodeId(6)), Some(NodeId(2)), Some(NodeId(8))]
        );
    }

    #[test]
    fn single_cell_has_no_neighbors() {
        let grid = GridTopology::new(1, 1).unwrap();
        assert_eq!(grid.neighbors(NodeId(1)).present_count(), 0);
    }

    #[test]
    fn neighbor_relation_symmetric() {
        let grid = GridTopology::new(4, 3).unwrap();
        for id in grid.sensors() {
            for (dir, peer) in grid.neighbors(id).present() {
                assert_eq!(grid.neighbors(peer).get(dir.opposite()), Some(id));
            }
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn neighbors_are_adjacent_cells(rows in 1u32..16, cols in 1u32..16) {
                let grid = GridTopology::new(rows, cols).unwrap();
                for id in grid.sensors() {
                    let here = grid.coord_of(id).unwrap();
                    let table = grid.neighbors(id);
                    prop_assert_eq!(table.slots().len(), DIRECTIONS_PER_NODE);
                    for (_, peer) in table.present() {
                        let there = grid.coord_of(peer).unwrap();
                        prop_assert_eq!(here.distance(&there), 1);
                    }
                }
            }
        }
    }
}
