//! Grid coordinates and axis directions.

use std::fmt;

/// A sensor position on the grid: `(row, col)`, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridCoord {
    /// Row index (north is row 0)
    pub row: u32,
    /// Column index (west is column 0)
    pub col: u32,
}

impl GridCoord {
    /// Top-left corner of the grid.
    pub const ORIGIN: Self = Self { row: 0, col: 0 };

    /// Create a new coordinate.
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Step one cell in `direction`, or `None` when that would leave the
    /// `rows × cols` grid.
    pub fn step(self, direction: Direction, rows: u32, cols: u32) -> Option<Self> {
        let (dr, dc) = direction.offset();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < rows && col < cols).then_some(Self { row, col })
    }

    /// Manhattan distance between two coordinates.
    pub fn distance(&self, other: &Self) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// The four axis directions, in neighbor-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    West,
    East,
    North,
    South,
}

impl Direction {
    /// Fixed neighbor-table order: west, east, north, south.
    pub const ALL: [Self; 4] = [Self::West, Self::East, Self::North, Self::South];

    /// `(row, col)` offset of one step in this direction.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::West => (0, -1),
            Self::East => (0, 1),
            Self::North => (-1, 0),
            Self::South => (1, 0),
        }
    }

    /// Slot of this direction in a neighbor table.
    pub const fn index(self) -> usize {
        match self {
            Self::West => 0,
            Self::East => 1,
            Self::North => 2,
            Self::South => 3,
        }
    }

    /// The direction pointing back.
    pub const fn opposite(self) -> Self {
        match self {
            Self::West => Self::East,
            Self::East => Self::West,
            Self::North => Self::South,
            Self::South => Self::North,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::West => write!(f, "west"),
            Self::East => write!(f, "east"),
            Self::North => write!(f, "north"),
            Self::South => write!(f, "south"),
        }
    }
}
