//! Scene viewport: pan offset and zoom.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.1;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 10.0;

/// The view transform of a scene.
///
/// Converts between screen coordinates and canvas (world) coordinates:
/// `screen = world * zoom + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Horizontal pan offset in screen pixels.
    pub x: f64,
    /// Vertical pan offset in screen pixels.
    pub y: f64,
    /// Zoom factor (1.0 = 100%).
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport with the given offset and zoom.
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Self { x, y, zoom }
    }

    /// This viewport with its zoom clamped to the allowed range, or `None`
    /// when a component is not finite.
    pub fn sanitized(self) -> Option<Self> {
        if !(self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite()) {
            return None;
        }
        Some(Self {
            zoom: self.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ..self
        })
    }

    /// Current translation offset.
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Transform from canvas coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset()) * Affine::scale(self.zoom)
    }

    /// Transform from screen coordinates to canvas coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset())
    }

    /// Convert a screen point to canvas coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a canvas point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Zoom, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;

        let new_screen = self.world_to_screen(world_point);
        self.x += screen_point.x - new_screen.x;
        self.y += screen_point.y - new_screen.y;
    }

    /// Reset to the origin at 100% zoom.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fit the viewport so `bounds` is centred inside a screen of `screen` size.
    pub fn fit_to_bounds(&mut self, bounds: Rect, screen: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let padded = Size::new(
            (screen.width - padding * 2.0).max(1.0),
            (screen.height - padding * 2.0).max(1.0),
        );

        let scale_x = padded.width / bounds.width();
        let scale_y = padded.height / bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(MIN_ZOOM, MAX_ZOOM);

        let bounds_center = bounds.center();
        self.x = screen.width / 2.0 - bounds_center.x * self.zoom;
        self.y = screen.height / 2.0 - bounds_center.y * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.offset(), Vec2::ZERO);
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_identity() {
        let viewport = Viewport::default();
        let screen = Point::new(100.0, 200.0);
        let world = viewport.screen_to_world(screen);
        assert!((world.x - screen.x).abs() < f64::EPSILON);
        assert!((world.y - screen.y).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_with_offset_and_zoom() {
        let viewport = Viewport::new(50.0, 100.0, 2.0);
        let world = viewport.screen_to_world(Point::new(150.0, 300.0));
        assert!((world.x - 50.0).abs() < 1e-10);
        assert!((world.y - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let viewport = Viewport::new(30.0, -20.0, 1.5);
        let original = Point::new(123.0, 456.0);
        let back = viewport.world_to_screen(viewport.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut viewport = Viewport::default();
        let anchor = Point::new(400.0, 300.0);
        let before = viewport.screen_to_world(anchor);
        viewport.zoom_at(anchor, 2.0);
        let after = viewport.screen_to_world(anchor);
        assert!((viewport.zoom - 2.0).abs() < f64::EPSILON);
        assert!((before.x - after.x).abs() < 1e-10);
        assert!((before.y - after.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut viewport = Viewport::default();
        viewport.zoom_at(Point::ZERO, 0.001);
        assert!((viewport.zoom - MIN_ZOOM).abs() < f64::EPSILON);

        viewport.zoom = 1.0;
        viewport.zoom_at(Point::ZERO, 1000.0);
        assert!((viewport.zoom - MAX_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sanitized() {
        assert_eq!(Viewport::new(5.0, 6.0, 2.0).sanitized(), Some(Viewport::new(5.0, 6.0, 2.0)));
        assert_eq!(Viewport::new(5.0, 6.0, 0.0).sanitized(), Some(Viewport::new(5.0, 6.0, MIN_ZOOM)));
        assert_eq!(Viewport::new(0.0, 0.0, -3.0).sanitized().map(|v| v.zoom), Some(MIN_ZOOM));
        assert_eq!(Viewport::new(0.0, 0.0, 1e9).sanitized().map(|v| v.zoom), Some(MAX_ZOOM));
        assert_eq!(Viewport::new(f64::NAN, 0.0, 1.0).sanitized(), None);
        assert_eq!(Viewport::new(0.0, f64::INFINITY, 1.0).sanitized(), None);
        assert_eq!(Viewport::new(0.0, 0.0, f64::NAN).sanitized(), None);
    }

    #[test]
    fn test_pan() {
        let mut viewport = Viewport::default();
        viewport.pan(Vec2::new(10.0, 20.0));
        assert!((viewport.x - 10.0).abs() < f64::EPSILON);
        assert!((viewport.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_bounds_centres_content() {
        let mut viewport = Viewport::default();
        let bounds = Rect::new(0.0, 0.0, 400.0, 200.0);
        viewport.fit_to_bounds(bounds, Size::new(800.0, 600.0), 0.0);
        let centre = viewport.world_to_screen(bounds.center());
        assert!((centre.x - 400.0).abs() < 1e-10);
        assert!((centre.y - 300.0).abs() < 1e-10);
        assert!((viewport.zoom - 2.0).abs() < 1e-10);
    }
}
