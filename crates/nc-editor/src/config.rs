//! Editor tuning knobs.
//!
//! Every field has a default, so a host may pass a partial JSON object
//! (or nothing at all) and get the stock behavior for the rest.

use nc_core::model::ItemKind;
use serde::{Deserialize, Serialize};

/// Width × height pair in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Minimum resize floor per item variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MinSizes {
    pub text: Size,
    pub sticky: Size,
    pub table: Size,
    pub todo: Size,
    /// Images only floor the width; the height follows the aspect lock.
    pub image: Size,
    pub media: Size,
    pub drawing: Size,
}

impl Default for MinSizes {
    fn default() -> Self {
        Self {
            text: Size::new(150.0, 60.0),
            sticky: Size::new(150.0, 100.0),
            table: Size::new(200.0, 100.0),
            todo: Size::new(200.0, 150.0),
            image: Size::new(100.0, 1.0),
            media: Size::new(200.0, 50.0),
            drawing: Size::new(10.0, 10.0),
        }
    }
}

/// Size of a freshly created item per tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefaultSizes {
    pub text: Size,
    pub sticky: Size,
    pub table: Size,
    pub todo: Size,
    pub audio: Size,
    pub video: Size,
    pub file: Size,
}

impl Default for DefaultSizes {
    fn default() -> Self {
        Self {
            text: Size::new(200.0, 60.0),
            sticky: Size::new(200.0, 200.0),
            table: Size::new(300.0, 150.0),
            todo: Size::new(250.0, 200.0),
            audio: Size::new(300.0, 60.0),
            video: Size::new(400.0, 300.0),
            file: Size::new(240.0, 64.0),
        }
    }
}

/// Configuration for a `CanvasSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Per-region undo depth. Default: **100**.
    pub local_history_capacity: usize,

    /// A drag/resize whose net change stays at or below this (canvas units)
    /// is a click and records nothing. Default: **1.0**.
    pub drag_threshold: f64,

    /// Zoom range, kept inside the hard `[0.1, 5.0]` bounds of the view.
    pub min_scale: f64,
    pub max_scale: f64,

    /// Wheel zoom factor is `exp(-delta_y * sensitivity)`.
    pub wheel_zoom_sensitivity: f64,

    /// Multiplicative step for keyboard zoom in/out.
    pub zoom_step: f64,

    pub min_sizes: MinSizes,
    pub default_sizes: DefaultSizes,

    /// Rows × cols of a table created by the table tool.
    pub default_table_rows: usize,
    pub default_table_cols: usize,

    /// Added to a stroke's bounding-box width and height. Default: **10**.
    pub drawing_padding: f64,

    /// Extra reach of a mask stroke when deciding a point is already
    /// erased. Default: **5**.
    pub mask_safety_margin: f64,

    pub eraser_radius: f64,
    pub stroke_width: f64,
    pub draw_color: String,

    /// Imported images wider than this are scaled down to it.
    pub max_image_width: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            local_history_capacity: 100,
            drag_threshold: 1.0,
            min_scale: nc_core::geometry::MIN_SCALE,
            max_scale: nc_core::geometry::MAX_SCALE,
            wheel_zoom_sensitivity: 0.002,
            zoom_step: 1.2,
            min_sizes: MinSizes::default(),
            default_sizes: DefaultSizes::default(),
            default_table_rows: 3,
            default_table_cols: 3,
            drawing_padding: 10.0,
            mask_safety_margin: 5.0,
            eraser_radius: 10.0,
            stroke_width: 3.0,
            draw_color: "#1f2937".to_string(),
            max_image_width: 400.0,
        }
    }
}

impl EditorConfig {
    /// Parse a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Resize floor for an item of this kind.
    pub fn min_size(&self, kind: &ItemKind) -> Size {
        let m = &self.min_sizes;
        match kind {
            ItemKind::Text(_) => m.text,
            ItemKind::Sticky(_) => m.sticky,
            ItemKind::Table(_) => m.table,
            ItemKind::Todo(_) => m.todo,
            ItemKind::Image(_) => m.image,
            ItemKind::Media(_) | ItemKind::Audio(_) | ItemKind::Video(_) | ItemKind::File(_) => {
                m.media
            }
            ItemKind::Drawing(_) => m.drawing,
        }
    }

    /// Whether resizing this kind keeps the starting aspect ratio.
    pub fn locks_aspect(&self, kind: &ItemKind) -> bool {
        matches!(kind, ItemKind::Image(_))
    }

    /// Clamp a requested scale to the configured zoom range.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        let (lo, hi) = if self.min_scale <= self.max_scale {
            (self.min_scale, self.max_scale)
        } else {
            (self.max_scale, self.min_scale)
        };
        scale.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nc_core::model::{MediaData, StickyData};

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EditorConfig::from_json(r#"{"dragThreshold": 3, "minSizes": {"sticky": {"width": 90, "height": 90}}}"#)
            .unwrap();
        assert_eq!(cfg.drag_threshold, 3.0);
        assert_eq!(cfg.local_history_capacity, 100);
        assert_eq!(cfg.min_sizes.sticky, Size::new(90.0, 90.0));
        assert_eq!(cfg.min_sizes.todo, Size::new(200.0, 150.0));
    }

    #[test]
    fn only_images_lock_aspect() {
        let cfg = EditorConfig::default();
        assert!(cfg.locks_aspect(&ItemKind::Image(MediaData::default())));
        assert!(!cfg.locks_aspect(&ItemKind::Video(MediaData::default())));
        assert_eq!(
            cfg.min_size(&ItemKind::Sticky(StickyData::default())),
            Size::new(150.0, 100.0)
        );
    }

    #[test]
    fn scale_clamp_tolerates_swapped_bounds() {
        let cfg = EditorConfig {
            min_scale: 2.0,
            max_scale: 0.5,
            ..EditorConfig::default()
        };
        assert_eq!(cfg.clamp_scale(10.0), 2.0);
        assert_eq!(cfg.clamp_scale(0.1), 0.5);
    }
}
