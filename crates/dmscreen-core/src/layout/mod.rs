//! Placement and collision resolution for modules on a scene.
//!
//! The engine is pure: it reads a snapshot of the other modules and returns a
//! position. It never mutates its inputs and performs no I/O.

mod candidates;
mod geometry;
mod resolver;

pub use candidates::candidate_positions;
pub use geometry::{FALLBACK_SIZE, LayoutItem, bounds, has_collision, overlaps};
pub use resolver::{Resolution, resolve, resolve_placement};
