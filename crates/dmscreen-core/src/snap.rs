//! Snap functionality for aligning canvas coordinates to the grid.

use kurbo::Point;

/// Grid size for snapping (matches the dotted canvas background).
pub const GRID_SIZE: f64 = 20.0;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Round to the nearest integer, with halfway cases going toward positive infinity.
///
/// `10.5` becomes `11`, `-10.5` becomes `-10`.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Snap a single coordinate to the nearest grid line.
pub fn snap_coordinate(value: f64, grid_size: f64) -> f64 {
    round_half_up(value / grid_size) * grid_size
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    SnapResult {
        point: Point::new(
            snap_coordinate(point.x, grid_size),
            snap_coordinate(point.y, grid_size),
        ),
        snapped_x: true,
        snapped_y: true,
    }
}

/// Snap a point when grid snapping is enabled, otherwise pass it through.
pub fn snap_point(point: Point, grid_snap: bool, grid_size: f64) -> SnapResult {
    if grid_snap {
        snap_to_grid(point, grid_size)
    } else {
        SnapResult::none(point)
    }
}

/// Check whether a coordinate lies on a grid line.
pub fn is_grid_aligned(value: f64, grid_size: f64) -> bool {
    let cells = value / grid_size;
    (cells - cells.round()).abs() < 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        let result = snap_to_grid(Point::new(23.0, 47.0), 20.0);
        assert_eq!(result.point, Point::new(20.0, 40.0));
        assert!(result.snapped_x);
        assert!(result.snapped_y);
    }

    #[test]
    fn test_snap_to_grid_exact() {
        let result = snap_to_grid(Point::new(40.0, 60.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
    }

    #[test]
    fn test_snap_to_grid_round_up() {
        let result = snap_to_grid(Point::new(31.0, 51.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
    }

    #[test]
    fn test_halfway_rounds_toward_positive_infinity() {
        assert_eq!(snap_coordinate(210.0, 20.0), 220.0);
        assert_eq!(snap_coordinate(-210.0, 20.0), -200.0);
        assert_eq!(snap_coordinate(-10.0, 20.0), 0.0);
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }

    #[test]
    fn test_snap_point_disabled() {
        let point = Point::new(23.0, 47.0);
        let result = snap_point(point, false, 20.0);
        assert_eq!(result.point, point);
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_grid_alignment_check() {
        assert!(is_grid_aligned(220.0, 20.0));
        assert!(is_grid_aligned(-40.0, 20.0));
        assert!(!is_grid_aligned(210.0, 20.0));
    }
}
