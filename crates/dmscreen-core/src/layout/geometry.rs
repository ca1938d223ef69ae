//! Bounding boxes and gap-aware overlap tests.

use crate::module::ModuleKind;
use kurbo::{Point, Rect, Size};

/// Size assumed for an item with neither a size nor a known kind.
pub const FALLBACK_SIZE: Size = Size::new(200.0, 150.0);

/// A module as seen by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutItem<'a> {
    pub id: &'a str,
    /// Top-left corner in canvas coordinates.
    pub position: Point,
    pub size: Option<Size>,
    pub kind: Option<ModuleKind>,
}

impl<'a> LayoutItem<'a> {
    pub fn new(id: &'a str, position: Point, size: Size) -> Self {
        Self {
            id,
            position,
            size: Some(size),
            kind: None,
        }
    }

    /// The same item at another position.
    pub fn at(self, position: Point) -> Self {
        Self { position, ..self }
    }

    /// Explicit size, else the kind's default size, else [`FALLBACK_SIZE`].
    pub fn effective_size(&self) -> Size {
        self.size
            .or_else(|| self.kind.map(|kind| kind.default_size()))
            .unwrap_or(FALLBACK_SIZE)
    }
}

/// Rectangle covered by an item.
///
/// Built verbatim from position and size. Zero or negative sizes are not
/// normalised, so a negative width yields a rectangle whose right edge lies
/// left of its origin.
pub fn bounds(item: &LayoutItem<'_>) -> Rect {
    let size = item.effective_size();
    Rect::new(
        item.position.x,
        item.position.y,
        item.position.x + size.width,
        item.position.y + size.height,
    )
}

/// Whether two rectangles come closer than `gap` on both axes.
///
/// Touching at exactly `gap` distance is not an overlap.
pub fn overlaps(a: Rect, b: Rect, gap: f64) -> bool {
    !(a.x1 + gap <= b.x0 || a.x0 >= b.x1 + gap || a.y1 + gap <= b.y0 || a.y0 >= b.y1 + gap)
}

/// Whether an item with `id` placed at `position` with `size` overlaps any of `others`.
///
/// The entry in `others` sharing `id` is the item itself and is ignored.
pub fn has_collision(
    id: &str,
    position: Point,
    size: Size,
    others: &[LayoutItem<'_>],
    gap: f64,
) -> bool {
    let rect = Rect::new(
        position.x,
        position.y,
        position.x + size.width,
        position.y + size.height,
    );
    others
        .iter()
        .any(|other| other.id != id && overlaps(rect, bounds(other), gap))
}
