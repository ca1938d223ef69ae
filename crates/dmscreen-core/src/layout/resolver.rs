//! Collision resolution: pick the final position for a placed module.

use super::candidates::candidate_positions;
use super::geometry::{LayoutItem, has_collision};
use crate::config::LayoutConfig;
use crate::snap::snap_to_grid;
use kurbo::Point;

/// Outcome of resolving a placement, tagged with the stage that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// The tentative position was already free.
    Unchanged(Point),
    /// The nearest free position adjacent to another module.
    Candidate(Point),
    /// First free cell found by the spiral search.
    Spiral(Point),
    /// Nothing free within the search radius. Holds the grid-snapped
    /// tentative position, which may still collide.
    Exhausted(Point),
}

impl Resolution {
    pub fn point(&self) -> Point {
        match *self {
            Resolution::Unchanged(p)
            | Resolution::Candidate(p)
            | Resolution::Spiral(p)
            | Resolution::Exhausted(p) => p,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Resolution::Exhausted(_))
    }
}

/// Resolve the position of `item` against `others`.
///
/// `item.position` is the tentative position. It is returned untouched when it
/// does not collide. Otherwise the candidates adjacent to the other modules are
/// filtered for collisions and the one nearest the tentative position wins,
/// with exact ties going to the earliest candidate. When every candidate
/// collides a spiral search runs outward from the snapped tentative position.
pub fn resolve(
    item: &LayoutItem<'_>,
    others: &[LayoutItem<'_>],
    layout: &LayoutConfig,
) -> Resolution {
    let size = item.effective_size();
    let tentative = item.position;
    let is_free = |point: Point| !has_collision(item.id, point, size, others, layout.gap);

    if is_free(tentative) {
        return Resolution::Unchanged(tentative);
    }

    let mut candidates = candidate_positions(item, others, layout);
    candidates.insert(0, tentative);

    let mut best: Option<(Point, f64)> = None;
    for candidate in candidates.into_iter().filter(|&p| is_free(p)) {
        let distance = (candidate - tentative).hypot();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    if let Some((point, _)) = best {
        return Resolution::Candidate(point);
    }

    spiral_search(tentative, layout, is_free)
}

/// Scan square rings around the snapped `origin`, one grid step wider each time.
///
/// Only perimeter cells are tested, x-offset in the outer loop and y-offset in
/// the inner loop, both ascending.
fn spiral_search(
    origin: Point,
    layout: &LayoutConfig,
    is_free: impl Fn(Point) -> bool,
) -> Resolution {
    let grid = layout.grid_size;
    let start = snap_to_grid(origin, grid).point;
    let max_radius = i64::from(layout.max_radius);

    for radius in 1..=max_radius {
        for i in -radius..=radius {
            for j in -radius..=radius {
                if i.abs() != radius && j.abs() != radius {
                    continue;
                }
                let point = Point::new(start.x + i as f64 * grid, start.y + j as f64 * grid);
                if is_free(point) {
                    return Resolution::Spiral(point);
                }
            }
        }
    }

    log::warn!(
        "No free position within {} rings of ({}, {}), keeping snapped position",
        layout.max_radius,
        start.x,
        start.y
    );
    Resolution::Exhausted(start)
}

/// Final position for `item`. Never fails.
pub fn resolve_placement(
    item: &LayoutItem<'_>,
    others: &[LayoutItem<'_>],
    layout: &LayoutConfig,
) -> Point {
    resolve(item, others, layout).point()
}
