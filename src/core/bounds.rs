use crate::core::geo::{Point, TileId};
use serde::{Deserialize, Serialize};

/// Axis-aligned range of tiles at a single zoom level.
///
/// `min_*` are inclusive and `max_*` exclusive, so an empty range has
/// `min == max` on at least one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub zoom: u8,
}

impl TileRange {
    /// Creates an empty range at `zoom`
    pub fn empty(zoom: u8) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
            zoom,
        }
    }

    /// Builds the range of tiles touched by the axis-aligned bounding box of
    /// four (possibly rotated) viewport corners, clamped to `[0, 2^zoom)`.
    ///
    /// Boxes with non-finite corners or without area yield an empty range.
    pub fn from_corners(corners: &[Point; 4], zoom: u8) -> Self {
        let Some(dimension) = TileId::dimension(zoom) else {
            return Self::empty(zoom);
        };
        if corners.iter().any(|corner| !corner.is_finite()) {
            return Self::empty(zoom);
        }

        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        if max_x - min_x <= 0.0 || max_y - min_y <= 0.0 {
            return Self::empty(zoom);
        }

        let dimension = dimension as f64;
        let tl_x = min_x.floor().max(0.0);
        let tl_y = min_y.floor().max(0.0);
        let br_x = max_x.ceil().min(dimension);
        let br_y = max_y.ceil().min(dimension);

        if br_x <= tl_x || br_y <= tl_y {
            return Self::empty(zoom);
        }

        Self {
            min_x: tl_x as u32,
            min_y: tl_y as u32,
            max_x: br_x as u32,
            max_y: br_y as u32,
            zoom,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    /// Number of tiles in the range
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if the range contains a tile
    pub fn contains(&self, id: &TileId) -> bool {
        id.z == self.zoom
            && id.x >= self.min_x
            && id.x < self.max_x
            && id.y >= self.min_y
            && id.y < self.max_y
    }

    /// Iterates the tiles of the range row by row
    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        (self.min_y..self.max_y)
            .flat_map(move |y| (self.min_x..self.max_x).map(move |x| TileId::new(x, y, self.zoom)))
    }
}
