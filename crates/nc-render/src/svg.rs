//! SVG output for a page: drawings with their erase masks composited,
//! other items as placeholder frames.
//!
//! Pixel erasing never deletes stroke data. Each drawing gets a `<mask>`
//! that is white everywhere and has its mask strokes painted black, so
//! the base stroke is carved out wherever an erase stroke passed.

use kurbo::{Affine, BezPath, Rect, Shape};
use nc_core::geometry::ViewTransform;
use nc_core::model::{CanvasItem, DrawingData, ItemKind};
use nc_core::path::parse_path;
use std::fmt::Write as _;

/// Build a `kurbo` path from the path mini-language.
pub fn to_bez_path(path: &str) -> BezPath {
    let mut bez = BezPath::new();
    match parse_path(path) {
        Ok(subpaths) => {
            for sub in subpaths {
                let mut pts = sub.iter();
                if let Some(first) = pts.next() {
                    bez.move_to((first.x, first.y));
                    for p in pts {
                        bez.line_to((p.x, p.y));
                    }
                }
            }
        }
        Err(e) => log::warn!("skipping malformed path: {e}"),
    }
    bez
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Region the mask must cover: item bounds plus every stroke's extent.
fn mask_region(item: &CanvasItem, drawing: &DrawingData, base: &BezPath) -> Rect {
    let widest = drawing
        .mask_paths
        .iter()
        .map(|m| m.stroke_width)
        .fold(drawing.stroke_width, f64::max);
    let item_rect = Rect::new(item.x, item.y, item.x + item.width, item.y + item.height);
    let mut region = item_rect.union(base.bounding_box());
    for mask in &drawing.mask_paths {
        region = region.union(to_bez_path(&mask.path).bounding_box());
    }
    region.inflate(widest, widest)
}

/// Render one drawing item as an SVG group. `None` for other variants.
pub fn render_drawing_svg(item: &CanvasItem) -> Option<String> {
    let ItemKind::Drawing(drawing) = &item.kind else {
        return None;
    };
    let base = to_bez_path(&drawing.paths);
    let id = escape_attr(item.id.as_str());
    let mut out = String::new();

    let _ = write!(out, r#"<g data-id="{id}" data-type="drawing">"#);
    let mask_attr = if drawing.mask_paths.is_empty() {
        String::new()
    } else {
        let region = mask_region(item, drawing, &base);
        let _ = write!(
            out,
            r#"<mask id="mask-{id}" maskUnits="userSpaceOnUse" x="{}" y="{}" width="{}" height="{}"><rect x="{}" y="{}" width="{}" height="{}" fill="white"/>"#,
            region.x0,
            region.y0,
            region.width(),
            region.height(),
            region.x0,
            region.y0,
            region.width(),
            region.height(),
        );
        for mask in &drawing.mask_paths {
            let _ = write!(
                out,
                r#"<path d="{}" fill="none" stroke="black" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                to_bez_path(&mask.path).to_svg(),
                mask.stroke_width,
            );
        }
        out.push_str("</mask>");
        format!(r#" mask="url(#mask-{id})""#)
    };
    let _ = write!(
        out,
        r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"{mask_attr}/>"#,
        base.to_svg(),
        escape_attr(&drawing.color),
        drawing.stroke_width,
    );
    out.push_str("</g>");
    Some(out)
}

fn render_frame(out: &mut String, item: &CanvasItem) {
    let _ = write!(
        out,
        r##"<rect data-id="{}" data-type="{}" x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#cbd5e1"/>"##,
        escape_attr(item.id.as_str()),
        item.type_name(),
        item.x,
        item.y,
        item.width,
        item.height,
    );
}

/// Render a whole page in paint order under the current view transform.
pub fn render_page_svg(items: &[CanvasItem], view: &ViewTransform, width: f64, height: f64) -> String {
    let offset = view.offset();
    let affine = Affine::new([view.scale(), 0.0, 0.0, view.scale(), offset.x, offset.y]);
    let [a, b, c, d, e, f] = affine.as_coeffs();

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}"><g transform="matrix({a} {b} {c} {d} {e} {f})">"#
    );
    for item in items {
        match render_drawing_svg(item) {
            Some(svg) => out.push_str(&svg),
            None => render_frame(&mut out, item),
        }
    }
    out.push_str("</g></svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_core::geometry::{Bounds, Point};
    use nc_core::id::ItemId;
    use nc_core::model::{MaskPath, TextData};

    fn drawing(masks: Vec<MaskPath>) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern("svg_d"),
            Bounds::new(10.0, 10.0, 20.0, 20.0),
            ItemKind::Drawing(DrawingData {
                paths: "M 10 10 L 20 10 L 20 20".into(),
                color: "#ff0000".into(),
                stroke_width: 2.0,
                mask_paths: masks,
            }),
        )
    }

    #[test]
    fn bez_path_follows_commands() {
        let bez = to_bez_path("M 0 0 L 10 0 M 5 5 L 5 9");
        assert_eq!(bez.elements().len(), 4);
        let bb = bez.bounding_box();
        assert_eq!((bb.x0, bb.y0, bb.x1, bb.y1), (0.0, 0.0, 10.0, 9.0));
    }

    #[test]
    fn unmasked_drawing_has_no_mask() {
        let svg = render_drawing_svg(&drawing(Vec::new())).unwrap();
        assert!(!svg.contains("<mask"));
        assert!(svg.contains(r##"stroke="#ff0000""##));
    }

    #[test]
    fn masks_are_black_strokes_on_white() {
        let svg = render_drawing_svg(&drawing(vec![MaskPath {
            path: "M 15 5 L 15 25".into(),
            stroke_width: 6.0,
        }]))
        .unwrap();
        assert!(svg.contains(r#"<mask id="mask-svg_d""#));
        assert!(svg.contains(r#"fill="white""#));
        assert!(svg.contains(r#"stroke="black" stroke-width="6""#));
        assert!(svg.contains(r#"mask="url(#mask-svg_d)""#));
    }

    #[test]
    fn page_applies_view_transform() {
        let text = CanvasItem::new(
            ItemId::intern("svg_t"),
            Bounds::new(0.0, 0.0, 150.0, 60.0),
            ItemKind::Text(TextData::default()),
        );
        let view = ViewTransform::new(2.0, Point::new(5.0, -5.0));
        let svg = render_page_svg(&[text, drawing(Vec::new())], &view, 800.0, 600.0);
        assert!(svg.contains("matrix(2 0 0 2 5 -5)"));
        assert!(svg.contains(r#"data-type="text""#));
        assert!(svg.find("svg_t").unwrap() < svg.find("svg_d").unwrap());
    }

    #[test]
    fn non_drawing_items_render_no_drawing_group() {
        let text = CanvasItem::new(
            ItemId::intern("svg_t2"),
            Bounds::new(0.0, 0.0, 150.0, 60.0),
            ItemKind::Text(TextData::default()),
        );
        assert!(render_drawing_svg(&text).is_none());
    }
}
