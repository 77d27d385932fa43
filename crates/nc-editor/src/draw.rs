//! Freehand strokes and the two eraser modes.
//!
//! Strokes are captured in screen space and converted to canvas space
//! only when the pointer lifts, so a pan/zoom mid-stroke cannot skew the
//! points already collected.

use nc_core::geometry::{Bounds, Point, ViewTransform};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, DrawingData, ItemKind, MaskPath};
use nc_core::path::emit_path;
use nc_render::hit::{point_is_masked, stroke_hit};
use smallvec::SmallVec;

/// Points of one stroke in progress, screen space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeCapture {
    points: Vec<Point>,
}

/// A finished stroke in canvas space.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedStroke {
    pub points: Vec<Point>,
    /// Min/max box padded on width and height.
    pub bounds: Bounds,
    /// `M x0 y0 L x1 y1 …`
    pub path: String,
}

impl StrokeCapture {
    /// Start a stroke seeded with the pointer-down position.
    pub fn begin(at: Point) -> Self {
        let mut capture = Self::default();
        capture.push(at);
        capture
    }

    pub fn push(&mut self, p: Point) {
        if p.is_finite() {
            self.points.push(p);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to canvas space and serialize. `None` below two points.
    pub fn finish(self, view: &ViewTransform, padding: f64) -> Option<CapturedStroke> {
        if self.points.len() < 2 {
            log::trace!("discarding {}-point stroke", self.points.len());
            return None;
        }
        let points: Vec<Point> = self.points.iter().map(|p| view.screen_to_canvas(*p)).collect();
        let bounds = Bounds::enclosing(&points, padding)?;
        let path = emit_path(&points);
        Some(CapturedStroke { points, bounds, path })
    }
}

/// Drawing item for a captured stroke. Bounds are the stroke's padded box.
pub fn drawing_item(stroke: &CapturedStroke, color: &str, stroke_width: f64) -> CanvasItem {
    CanvasItem::new(
        ItemId::generate("drawing"),
        stroke.bounds,
        ItemKind::Drawing(DrawingData {
            paths: stroke.path.clone(),
            color: color.to_string(),
            stroke_width,
            mask_paths: Vec::new(),
        }),
    )
}

/// Drawings hit by an object eraser at canvas point `p`.
///
/// A drawing counts when its base stroke is within
/// `eraser_radius + strokeWidth / 2` and that spot is not already covered
/// by one of its mask strokes.
pub fn object_erase_hits(
    items: &[CanvasItem],
    p: Point,
    eraser_radius: f64,
    mask_margin: f64,
) -> SmallVec<[ItemId; 4]> {
    items
        .iter()
        .filter_map(|item| {
            let drawing = item.as_drawing()?;
            if !stroke_hit(drawing, p, eraser_radius) {
                return None;
            }
            if point_is_masked(drawing, p, mask_margin) {
                log::trace!("{} already erased at {p:?}", item.id);
                return None;
            }
            Some(item.id)
        })
        .collect()
}

/// Apply a pixel-erase stroke: every drawing whose bounds intersect the
/// stroke's bounds gains the stroke as a mask. Returns `(prev, next)` per
/// affected drawing.
pub fn pixel_erase(
    items: &[CanvasItem],
    stroke: &CapturedStroke,
    mask_width: f64,
) -> Vec<(CanvasItem, CanvasItem)> {
    items
        .iter()
        .filter(|item| item.as_drawing().is_some() && item.bounds().intersects(&stroke.bounds))
        .map(|item| {
            let mut next = item.clone();
            if let ItemKind::Drawing(d) = &mut next.kind {
                d.mask_paths.push(MaskPath {
                    path: stroke.path.clone(),
                    stroke_width: mask_width,
                });
            }
            (item.clone(), next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_core::model::StickyData;

    fn capture(points: &[(f64, f64)]) -> StrokeCapture {
        let mut c = StrokeCapture::begin(Point::new(points[0].0, points[0].1));
        for &(x, y) in &points[1..] {
            c.push(Point::new(x, y));
        }
        c
    }

    #[test]
    fn stroke_bounds_are_padded() {
        let stroke = capture(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)])
            .finish(&ViewTransform::default(), 10.0)
            .unwrap();
        assert_eq!(stroke.bounds, Bounds::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(stroke.path, "M 10 10 L 20 10 L 20 20");
    }

    #[test]
    fn stroke_points_are_mapped_to_canvas() {
        let view = ViewTransform::new(2.0, Point::new(10.0, 10.0));
        let stroke = capture(&[(10.0, 10.0), (30.0, 50.0)]).finish(&view, 0.0).unwrap();
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(10.0, 20.0)]);
    }

    #[test]
    fn single_point_stroke_is_dropped() {
        assert!(StrokeCapture::begin(Point::new(1.0, 1.0))
            .finish(&ViewTransform::default(), 10.0)
            .is_none());
    }

    fn drawing(id: &str, path: &str, masks: Vec<MaskPath>) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern(id),
            Bounds::new(0.0, 0.0, 110.0, 10.0),
            ItemKind::Drawing(DrawingData {
                paths: path.into(),
                color: "#000".into(),
                stroke_width: 2.0,
                mask_paths: masks,
            }),
        )
    }

    #[test]
    fn object_erase_skips_masked_spots_and_other_items() {
        let sticky = CanvasItem::new(
            ItemId::intern("de_sticky"),
            Bounds::new(0.0, 0.0, 200.0, 200.0),
            ItemKind::Sticky(StickyData::default()),
        );
        let plain = drawing("de_plain", "M 0 0 L 100 0", vec![]);
        let masked = drawing(
            "de_masked",
            "M 0 5 L 100 5",
            vec![MaskPath {
                path: "M 45 5 L 55 5".into(),
                stroke_width: 10.0,
            }],
        );
        let hits = object_erase_hits(&[sticky, plain, masked], Point::new(50.0, 3.0), 5.0, 5.0);
        assert_eq!(hits.as_slice(), [ItemId::intern("de_plain")]);
    }

    #[test]
    fn pixel_erase_masks_only_intersecting_drawings() {
        let near = drawing("pe_near", "M 0 0 L 100 0", vec![]);
        let mut far = drawing("pe_far", "M 500 500 L 600 500", vec![]);
        far.x = 500.0;
        far.y = 500.0;
        let stroke = capture(&[(40.0, -5.0), (60.0, 5.0)])
            .finish(&ViewTransform::default(), 10.0)
            .unwrap();
        let updates = pixel_erase(&[near.clone(), far], &stroke, 20.0);
        assert_eq!(updates.len(), 1);
        let (prev, next) = &updates[0];
        assert_eq!(prev, &near);
        let masks = &next.as_drawing().unwrap().mask_paths;
        assert_eq!(
            masks,
            &vec![MaskPath {
                path: "M 40 -5 L 60 5".into(),
                stroke_width: 20.0
            }]
        );
        // Base stroke data is untouched.
        assert_eq!(next.as_drawing().unwrap().paths, "M 0 0 L 100 0");
    }
}
