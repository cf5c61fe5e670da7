//! Tsunameter Sensor Grid Topology
//!
//! Sensors are laid out on a fixed `rows × cols` Cartesian grid without
//! wrap-around. Each sensor talks to at most 4 axis neighbors:
//! - West / East (same row, adjacent column)
//! - North / South (same column, adjacent row)
//!
//! Sensors at the grid edge have fewer neighbors; the missing directions are
//! reported explicitly as absent rather than omitted, so every neighbor table
//! has the same fixed shape.
//!
//! # Endpoint Identities
//!
//! Endpoint `0` is always the base station. Sensors occupy endpoints
//! `1..=rows*cols` in row-major order: the sensor with rank `r = id - 1` sits
//! at `(r / cols, r % cols)`.

mod coord;
mod grid;
mod neighbors;

pub use coord::{Direction, GridCoord};
pub use grid::{GridTopology, NodeId, TopologyError, BASE_STATION};
pub use neighbors::Neighbors;

/// Number of axis directions per sensor (invariant: always 4)
pub const DIRECTIONS_PER_NODE: usize = 4;

/// Result type for topology construction.
pub type Result<T> = std::result::Result<T, TopologyError>;

const _: () = assert!(Direction::ALL.len() == DIRECTIONS_PER_NODE);
