//! Grid-aligned positions adjacent to existing modules.

use super::geometry::{LayoutItem, bounds};
use crate::config::LayoutConfig;
use crate::snap::snap_coordinate;
use kurbo::Point;

/// Positions to the left, right, above and below every other item.
///
/// Emits four candidates per other item in that order, skipping the entry
/// sharing `item.id`. Coordinates are always snapped to the grid, even when
/// grid snapping is switched off for the session. No collision filtering
/// happens here.
pub fn candidate_positions(
    item: &LayoutItem<'_>,
    others: &[LayoutItem<'_>],
    layout: &LayoutConfig,
) -> Vec<Point> {
    let grid = layout.grid_size;
    let gap = layout.gap;
    let size = item.effective_size();
    let mut candidates = Vec::with_capacity(others.len() * 4);

    for other in others.iter().filter(|other| other.id != item.id) {
        let rect = bounds(other);
        let aligned_x = snap_coordinate(other.position.x, grid);
        let aligned_y = snap_coordinate(other.position.y, grid);

        // left
        candidates.push(Point::new(
            snap_coordinate(rect.x0 - size.width - gap, grid),
            aligned_y,
        ));
        // right
        candidates.push(Point::new(snap_coordinate(rect.x1 + gap, grid), aligned_y));
        // above
        candidates.push(Point::new(
            aligned_x,
            snap_coordinate(rect.y0 - size.height - gap, grid),
        ));
        // below
        candidates.push(Point::new(aligned_x, snap_coordinate(rect.y1 + gap, grid)));
    }

    candidates
}
