use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Source of the current camera state, as seen by the coverage engine.
///
/// Projection from screen space is the implementor's business; the engine
/// only needs the integer zoom and the four viewport corners in tile units.
pub trait ViewportProvider {
    /// Current zoom level, not yet clamped to the engine's limits
    fn current_zoom(&self) -> i32;

    /// The four viewport corners projected into tile space at `zoom`.
    /// The quad may be rotated.
    fn corners_at_zoom(&self, zoom: u8) -> [Point; 4];
}

/// A viewport described directly in tile space.
///
/// Corners are stored at `reference_zoom` and rescaled by powers of two for
/// other zoom levels. Used by tests, demos and headless tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticViewport {
    zoom: i32,
    reference_zoom: i32,
    corners: [Point; 4],
}

impl StaticViewport {
    /// Creates a viewport whose corners are given in tile units at `zoom`
    pub fn new(zoom: i32, corners: [Point; 4]) -> Self {
        Self {
            zoom,
            reference_zoom: zoom,
            corners,
        }
    }

    /// Creates an axis-aligned viewport from its top-left and bottom-right corners
    pub fn from_box(zoom: i32, min: Point, max: Point) -> Self {
        Self::new(
            zoom,
            [
                Point::new(min.x, min.y),
                Point::new(max.x, min.y),
                Point::new(max.x, max.y),
                Point::new(min.x, max.y),
            ],
        )
    }

    /// Creates an axis-aligned viewport `width × height` tiles around `center`
    pub fn centered(zoom: i32, center: Point, width: f64, height: f64) -> Self {
        let half = Point::new(width / 2.0, height / 2.0);
        Self::from_box(
            zoom,
            Point::new(center.x - half.x, center.y - half.y),
            center.add(&half),
        )
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    /// Centre of the viewport in tile units at the current zoom
    pub fn center(&self) -> Point {
        let sum = self
            .corners
            .iter()
            .fold(Point::default(), |acc, corner| acc.add(corner));
        sum.multiply(0.25 * self.scale_for(self.zoom))
    }

    /// Moves the viewport by `delta` tiles at the current zoom
    pub fn pan_by(&mut self, delta: Point) {
        let delta = delta.multiply(1.0 / self.scale_for(self.zoom));
        for corner in &mut self.corners {
            *corner = corner.add(&delta);
        }
    }

    /// Changes zoom around the viewport centre, keeping its on-screen size
    pub fn zoom_to(&mut self, zoom: i32) {
        let center = self.center();
        let corners = self.corners_at(self.zoom);
        let new_center = center.multiply(2_f64.powi(zoom - self.zoom));
        let offset = Point::new(new_center.x - center.x, new_center.y - center.y);

        self.corners = corners.map(|corner| corner.add(&offset));
        self.reference_zoom = zoom;
        self.zoom = zoom;
    }

    /// Rotates the viewport corners around its centre
    pub fn rotate(&mut self, radians: f64) {
        let center = self.center();
        let (sin, cos) = radians.sin_cos();
        let corners = self.corners_at(self.zoom);

        self.corners = corners.map(|corner| {
            let dx = corner.x - center.x;
            let dy = corner.y - center.y;
            Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
        });
        self.reference_zoom = self.zoom;
    }

    fn scale_for(&self, zoom: i32) -> f64 {
        2_f64.powi(zoom - self.reference_zoom)
    }

    fn corners_at(&self, zoom: i32) -> [Point; 4] {
        let scale = self.scale_for(zoom);
        self.corners.map(|corner| corner.multiply(scale))
    }
}

impl ViewportProvider for StaticViewport {
    fn current_zoom(&self) -> i32 {
        self.zoom
    }

    fn corners_at_zoom(&self, zoom: u8) -> [Point; 4] {
        self.corners_at(zoom as i32)
    }
}
