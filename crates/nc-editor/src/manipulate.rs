//! Direct manipulation: the drag/resize state machine shared by every
//! item variant.
//!
//! A session records the pointer and the full item at gesture start.
//! Every move maps the screen-space pointer delta into canvas space and
//! yields a live patch relative to that start. On release the session
//! decides whether the gesture was a real edit or just a click.

use crate::config::EditorConfig;
use nc_core::geometry::{Point, ViewTransform};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, ItemPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize,
}

/// One in-flight drag or resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationSession {
    kind: GestureKind,
    start_mouse: Point,
    start_item: CanvasItem,
}

impl ManipulationSession {
    pub fn begin(kind: GestureKind, item: &CanvasItem, mouse: Point) -> Self {
        log::trace!("{kind:?} {} from {mouse:?}", item.id);
        Self {
            kind,
            start_mouse: mouse,
            start_item: item.clone(),
        }
    }

    pub fn drag(item: &CanvasItem, mouse: Point) -> Self {
        Self::begin(GestureKind::Drag, item, mouse)
    }

    pub fn resize(item: &CanvasItem, mouse: Point) -> Self {
        Self::begin(GestureKind::Resize, item, mouse)
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn item_id(&self) -> ItemId {
        self.start_item.id
    }

    /// The item as it was when the gesture began.
    pub fn start_item(&self) -> &CanvasItem {
        &self.start_item
    }

    /// Live patch for the pointer at `mouse`. `None` when the math would
    /// produce non-finite geometry.
    pub fn update(&self, mouse: Point, view: &ViewTransform, cfg: &EditorConfig) -> Option<ItemPatch> {
        let delta = view.screen_delta_to_canvas(mouse - self.start_mouse);
        if !delta.is_finite() {
            log::warn!("dropping non-finite {:?} delta {delta:?}", self.kind);
            return None;
        }
        let start = &self.start_item;
        match self.kind {
            GestureKind::Drag => Some(ItemPatch::position(start.x + delta.x, start.y + delta.y)),
            GestureKind::Resize => {
                let (width, height) = self.resized(delta, cfg);
                Some(ItemPatch::size(width, height))
            }
        }
    }

    fn resized(&self, delta: Point, cfg: &EditorConfig) -> (f64, f64) {
        let start = &self.start_item;
        let min = cfg.min_size(&start.kind);
        let width = (start.width + delta.x).max(min.width);
        if cfg.locks_aspect(&start.kind) && start.width > 0.0 && start.height > 0.0 {
            let ratio = start.width / start.height;
            return (width, width / ratio);
        }
        (width, (start.height + delta.y).max(min.height))
    }

    /// Close the gesture against the item's current state. Returns the
    /// `(prev, next)` snapshots when the change exceeds the drag
    /// threshold, `None` for a click.
    pub fn finish(self, current: &CanvasItem, cfg: &EditorConfig) -> Option<(CanvasItem, CanvasItem)> {
        let start = &self.start_item;
        let moved = match self.kind {
            GestureKind::Drag => (current.x - start.x).abs().max((current.y - start.y).abs()),
            GestureKind::Resize => (current.width - start.width)
                .abs()
                .max((current.height - start.height).abs()),
        };
        if moved > cfg.drag_threshold {
            log::debug!("{:?} {} committed", self.kind, start.id);
            Some((self.start_item, current.clone()))
        } else {
            None
        }
    }

    /// Patch that puts the item back where the gesture found it.
    pub fn revert_patch(&self) -> ItemPatch {
        ItemPatch::replace(&self.start_item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_core::geometry::Bounds;
    use nc_core::model::{ItemKind, MediaData, StickyData};

    fn item(kind: ItemKind, w: f64, h: f64) -> CanvasItem {
        CanvasItem::new(ItemId::intern("m1"), Bounds::new(100.0, 100.0, w, h), kind)
    }

    fn sticky() -> CanvasItem {
        item(ItemKind::Sticky(StickyData::default()), 200.0, 200.0)
    }

    #[test]
    fn drag_delta_is_divided_by_scale() {
        let cfg = EditorConfig::default();
        let view = ViewTransform::new(2.0, Point::new(30.0, 40.0));
        let s = ManipulationSession::drag(&sticky(), Point::new(100.0, 100.0));
        let patch = s.update(Point::new(150.0, 130.0), &view, &cfg).unwrap();
        assert_eq!((patch.x, patch.y), (Some(125.0), Some(115.0)));
    }

    #[test]
    fn drag_is_unbounded() {
        let cfg = EditorConfig::default();
        let s = ManipulationSession::drag(&sticky(), Point::new(0.0, 0.0));
        let patch = s.update(Point::new(-500.0, -500.0), &ViewTransform::default(), &cfg).unwrap();
        assert_eq!((patch.x, patch.y), (Some(-400.0), Some(-400.0)));
    }

    #[test]
    fn resize_clamps_at_variant_minimum() {
        let cfg = EditorConfig::default();
        let s = ManipulationSession::resize(&sticky(), Point::new(0.0, 0.0));
        let patch = s.update(Point::new(-1000.0, -1000.0), &ViewTransform::default(), &cfg).unwrap();
        assert_eq!((patch.width, patch.height), (Some(150.0), Some(100.0)));
    }

    #[test]
    fn image_resize_keeps_aspect() {
        let cfg = EditorConfig::default();
        let image = item(ItemKind::Image(MediaData::default()), 400.0, 200.0);
        let s = ManipulationSession::resize(&image, Point::new(0.0, 0.0));
        let patch = s.update(Point::new(-100.0, 77.0), &ViewTransform::default(), &cfg).unwrap();
        assert_eq!((patch.width, patch.height), (Some(300.0), Some(150.0)));

        let patch = s.update(Point::new(-390.0, 0.0), &ViewTransform::default(), &cfg).unwrap();
        assert_eq!((patch.width, patch.height), (Some(100.0), Some(50.0)));
    }

    #[test]
    fn sub_threshold_release_is_a_click() {
        let cfg = EditorConfig::default();
        let start = sticky();
        let s = ManipulationSession::drag(&start, Point::new(0.0, 0.0));
        let nudged = start.moved_to(100.5, 101.0);
        assert!(s.clone().finish(&nudged, &cfg).is_none());
        let moved = start.moved_to(101.5, 100.0);
        let (prev, next) = s.finish(&moved, &cfg).unwrap();
        assert_eq!((prev.x, next.x), (100.0, 101.5));
    }

    #[test]
    fn non_finite_pointer_is_ignored() {
        let cfg = EditorConfig::default();
        let s = ManipulationSession::drag(&sticky(), Point::new(0.0, 0.0));
        assert!(s.update(Point::new(f64::NAN, 0.0), &ViewTransform::default(), &cfg).is_none());
    }
}
