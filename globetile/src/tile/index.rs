//! Quadtree tile addressing.
//!
//! A [`TileIndex`] addresses one cell of the global geodetic quadtree. The
//! grid has two root tiles at level 0 (west and east hemisphere); every
//! level doubles the resolution along both axes. Row `y = 0` touches the
//! north pole, columns grow eastward from the antimeridian.

use crate::geodetic::Quad;

/// Address of one quadtree cell: column, row and subdivision level.
///
/// The children of `(x, y, level)` are `(2x, 2y)`, `(2x+1, 2y)`, `(2x, 2y+1)`
/// and `(2x+1, 2y+1)` at `level + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndex {
    /// Column, in `[0, 2^(level+1))`, growing eastward.
    pub x: u32,
    /// Row, in `[0, 2^level)`, growing southward.
    pub y: u32,
    /// Quadtree subdivision level; 0 is the two-tile root row.
    pub level: u8,
}

/// Key type used for tile hashmaps and the disk cache.
pub type TileHashKey = u64;

impl TileIndex {
    pub fn new(x: u32, y: u32, level: u8) -> Self {
        Self { x, y, level }
    }

    /// Number of tile columns at this level.
    pub fn columns_at(level: u8) -> u32 {
        2 << level
    }

    /// Number of tile rows at this level.
    pub fn rows_at(level: u8) -> u32 {
        1 << level
    }

    /// The child index in the given quadrant, one level deeper.
    pub fn child(&self, quad: Quad) -> TileIndex {
        let (dx, dy) = match quad {
            Quad::NorthWest => (0, 0),
            Quad::NorthEast => (1, 0),
            Quad::SouthWest => (0, 1),
            Quad::SouthEast => (1, 1),
        };
        TileIndex {
            x: 2 * self.x + dx,
            y: 2 * self.y + dy,
            level: self.level + 1,
        }
    }

    /// The parent index, or `None` at the root level.
    pub fn parent(&self) -> Option<TileIndex> {
        if self.level == 0 {
            return None;
        }
        Some(TileIndex {
            x: self.x / 2,
            y: self.y / 2,
            level: self.level - 1,
        })
    }

    /// True if this index occupies the eastern half of its parent.
    pub fn is_east_child(&self) -> bool {
        self.x % 2 == 1
    }

    /// True if this index occupies the northern half of its parent.
    pub fn is_north_child(&self) -> bool {
        self.y % 2 == 0
    }

    /// Grid distance to another index at the same level.
    pub fn manhattan(&self, other: &TileIndex) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Stable key for hashmap and disk-cache lookups.
    ///
    /// Packs the triple into 64 bits; levels stay well below 32 and the
    /// coordinates below 2^28 at any level the engine subdivides to.
    pub fn hash_key(&self) -> TileHashKey {
        ((self.x as u64) << 35) | ((self.y as u64) << 6) | self.level as u64
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{x: {}, y: {}, level: {}}}", self.x, self.y, self.level)
    }
}
