//! Hit testing: point → item lookup, and stroke/eraser hit tests.
//!
//! Items are painted in list order, so the last item is topmost and the
//! lookup walks the list in reverse.

use nc_core::geometry::{Bounds, Point, polyline_within};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, DrawingData};
use nc_core::path::{SubPath, parse_path};

/// Find the topmost item whose bounds contain `p` (canvas space).
/// Returns `None` if the point is over empty canvas.
pub fn hit_test(items: &[CanvasItem], p: Point) -> Option<ItemId> {
    items
        .iter()
        .rev()
        .find(|item| item.bounds().contains(p))
        .map(|item| item.id)
}

/// All items whose bounds intersect `rect`, in paint order.
pub fn items_in_rect(items: &[CanvasItem], rect: &Bounds) -> Vec<ItemId> {
    items
        .iter()
        .filter(|item| item.bounds().intersects(rect))
        .map(|item| item.id)
        .collect()
}

fn subpaths(path: &str) -> Vec<SubPath> {
    parse_path(path).unwrap_or_else(|e| {
        log::warn!("unhittable drawing path: {e}");
        Vec::new()
    })
}

/// Does `p` lie within `threshold` of any segment of `path`?
/// Segments never join across sub-path boundaries.
pub fn path_within(path: &str, p: Point, threshold: f64) -> bool {
    subpaths(path)
        .iter()
        .any(|sub| polyline_within(sub, p, threshold))
}

/// Eraser test against a drawing's base stroke:
/// hit iff the distance is `<= eraser_radius + stroke_width / 2`.
pub fn stroke_hit(drawing: &DrawingData, p: Point, eraser_radius: f64) -> bool {
    path_within(&drawing.paths, p, eraser_radius + drawing.stroke_width / 2.0)
}

/// Is `p` already covered by one of the drawing's mask strokes?
/// Each mask is tested with `mask.stroke_width / 2 + safety_margin`.
pub fn point_is_masked(drawing: &DrawingData, p: Point, safety_margin: f64) -> bool {
    drawing
        .mask_paths
        .iter()
        .any(|mask| path_within(&mask.path, p, mask.stroke_width / 2.0 + safety_margin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_core::model::{ItemKind, MaskPath, StickyData};

    fn sticky(id: &str, x: f64, y: f64) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern(id),
            Bounds::new(x, y, 150.0, 100.0),
            ItemKind::Sticky(StickyData::default()),
        )
    }

    fn line() -> DrawingData {
        DrawingData {
            paths: "M 0 0 L 100 0".into(),
            color: "#000".into(),
            stroke_width: 4.0,
            mask_paths: Vec::new(),
        }
    }

    #[test]
    fn topmost_item_wins() {
        let items = vec![sticky("under", 0.0, 0.0), sticky("over", 50.0, 50.0)];
        assert_eq!(hit_test(&items, Point::new(60.0, 60.0)), Some(ItemId::intern("over")));
        assert_eq!(hit_test(&items, Point::new(10.0, 10.0)), Some(ItemId::intern("under")));
        assert_eq!(hit_test(&items, Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn rect_query_returns_paint_order() {
        let items = vec![sticky("a", 0.0, 0.0), sticky("b", 400.0, 0.0), sticky("c", 100.0, 50.0)];
        let hits = items_in_rect(&items, &Bounds::new(120.0, 60.0, 10.0, 10.0));
        assert_eq!(hits, vec![ItemId::intern("a"), ItemId::intern("c")]);
    }

    #[test]
    fn stroke_threshold_includes_half_width() {
        let d = line();
        // radius 8 + half-width 2 = 10
        assert!(stroke_hit(&d, Point::new(50.0, 10.0), 8.0));
        assert!(!stroke_hit(&d, Point::new(50.0, 10.01), 8.0));
    }

    #[test]
    fn subpaths_are_not_joined() {
        // The gap between (10,0) and (90,0) is not a segment.
        assert!(!path_within("M 0 0 L 10 0 M 90 0 L 100 0", Point::new(50.0, 0.0), 1.0));
    }

    #[test]
    fn mask_check_uses_safety_margin() {
        let mut d = line();
        d.mask_paths.push(MaskPath {
            path: "M 40 0 L 60 0".into(),
            stroke_width: 10.0,
        });
        assert!(point_is_masked(&d, Point::new(50.0, 9.0), 5.0));
        assert!(point_is_masked(&d, Point::new(65.0, 0.0), 5.0));
        assert!(!point_is_masked(&d, Point::new(75.0, 0.0), 5.0));
    }

    #[test]
    fn malformed_path_never_hits() {
        assert!(!path_within("garbage", Point::new(0.0, 0.0), 1e9));
    }
}
