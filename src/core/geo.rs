use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Represents a point in tile space (one unit per tile at a given zoom)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Identifies a tile in the slippy map quadtree.
///
/// At zoom `z` the map is split into `2^z × 2^z` tiles; a tile is covered
/// exactly by its four children at `z + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileId {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at `zoom`, `None` past the `u32` range.
    pub fn dimension(zoom: u8) -> Option<u32> {
        1_u32.checked_shl(zoom as u32)
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        match Self::dimension(self.z) {
            Some(max_coord) => self.x < max_coord && self.y < max_coord,
            None => false,
        }
    }

    /// Ancestor of this tile at `target_zoom`, or `None` unless
    /// `target_zoom < self.z`.
    pub fn parent(&self, target_zoom: u8) -> Option<TileId> {
        if target_zoom >= self.z {
            return None;
        }
        let shift = (self.z - target_zoom) as u32;
        Some(TileId::new(self.x >> shift, self.y >> shift, target_zoom))
    }

    /// All descendants of this tile at `target_zoom`, row-major.
    ///
    /// One level down yields exactly four tiles; `d` levels down yield `4^d`.
    /// Empty unless `target_zoom > self.z`.
    pub fn children(&self, target_zoom: u8) -> Vec<TileId> {
        if target_zoom <= self.z || target_zoom as u32 >= u32::BITS {
            return Vec::new();
        }
        let depth = (target_zoom - self.z) as u32;
        let side = 1_u32 << depth;
        let base_x = self.x << depth;
        let base_y = self.y << depth;

        let mut children = Vec::with_capacity((side as usize) * (side as usize));
        for dy in 0..side {
            for dx in 0..side {
                children.push(TileId::new(base_x + dx, base_y + dy, target_zoom));
            }
        }
        children
    }

    /// True if `other` lies strictly below this tile in the quadtree.
    pub fn is_ancestor_of(&self, other: &TileId) -> bool {
        other.parent(self.z).as_ref() == Some(self)
    }

    /// Bing-style quadkey, one base-4 digit per zoom level.
    pub fn quadkey(&self) -> String {
        (1..=self.z)
            .rev()
            .map(|level| {
                let mask = 1_u32 << (level - 1);
                let mut digit = b'0';
                if self.x & mask != 0 {
                    digit += 1;
                }
                if self.y & mask != 0 {
                    digit += 2;
                }
                digit as char
            })
            .collect()
    }
}

impl Ord for TileId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.z
            .cmp(&other.z)
            .then(self.y.cmp(&other.y))
            .then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for TileId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_one_level() {
        let id = TileId::new(1, 2, 5);
        let children = id.children(6);

        assert_eq!(children.len(), 4);
        assert_eq!(
            children,
            vec![
                TileId::new(2, 4, 6),
                TileId::new(3, 4, 6),
                TileId::new(2, 5, 6),
                TileId::new(3, 5, 6),
            ]
        );
        for child in &children {
            assert!(child.is_valid());
            assert_eq!(child.parent(5), Some(id));
        }
    }

    #[test]
    fn test_children_multiple_levels() {
        let id = TileId::new(3, 1, 2);
        let grandchildren = id.children(4);

        assert_eq!(grandchildren.len(), 16);
        assert!(grandchildren.iter().all(|c| c.parent(2) == Some(id)));
        assert!(id.children(2).is_empty());
        assert!(id.children(1).is_empty());
    }

    #[test]
    fn test_parent() {
        let id = TileId::new(13, 7, 5);

        assert_eq!(id.parent(4), Some(TileId::new(6, 3, 4)));
        assert_eq!(id.parent(2), Some(TileId::new(1, 0, 2)));
        assert_eq!(id.parent(0), Some(TileId::new(0, 0, 0)));
        assert_eq!(id.parent(5), None);
        assert_eq!(id.parent(6), None);
    }

    #[test]
    fn test_validity() {
        assert!(TileId::new(0, 0, 0).is_valid());
        assert!(!TileId::new(1, 0, 0).is_valid());
        assert!(TileId::new(31, 31, 5).is_valid());
        assert!(!TileId::new(32, 0, 5).is_valid());
    }

    #[test]
    fn test_ancestry_and_ordering() {
        let parent = TileId::new(1, 1, 1);
        let child = TileId::new(3, 2, 2);
        let stranger = TileId::new(0, 0, 2);

        assert!(parent.is_ancestor_of(&child));
        assert!(!parent.is_ancestor_of(&stranger));
        assert!(!parent.is_ancestor_of(&parent));

        let mut ids = vec![child, parent, stranger];
        ids.sort();
        assert_eq!(ids, vec![parent, stranger, child]);
    }

    #[test]
    fn test_quadkey_and_display() {
        assert_eq!(TileId::new(3, 5, 3).quadkey(), "213");
        assert_eq!(TileId::new(0, 0, 0).quadkey(), "");
        assert_eq!(TileId::new(3, 5, 3).to_string(), "3/3/5");
    }
}
