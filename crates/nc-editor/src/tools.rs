//! Tool selection and toolbar state.
//!
//! The creation tools (text, sticky, table, todo) place one item at the
//! clicked canvas point and then hand control back to `Select`.

use crate::config::EditorConfig;
use crate::history::HistoryStatus;
use nc_core::geometry::{Bounds, Point};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, ItemKind, StickyData, TextData, TodoData};
use nc_core::table::TableData;
use serde::{Deserialize, Serialize};

/// The active tool determines how pointer events are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    #[default]
    Select,
    Text,
    Sticky,
    Table,
    Todo,
    Draw,
    Eraser,
}

impl ToolKind {
    /// Tools that create an item on click.
    pub fn creates_item(self) -> bool {
        matches!(self, ToolKind::Text | ToolKind::Sticky | ToolKind::Table | ToolKind::Todo)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EraserMode {
    /// Delete whole drawings touched by the eraser.
    #[default]
    Object,
    /// Mask out only the pixels under the eraser stroke.
    Pixel,
}

/// Everything the toolbar shows and edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarState {
    pub tool: ToolKind,
    pub draw_color: String,
    pub stroke_width: f64,
    pub eraser_mode: EraserMode,
    pub eraser_radius: f64,
    #[serde(default)]
    pub can_undo: bool,
    #[serde(default)]
    pub can_redo: bool,
    #[serde(default)]
    pub recording: bool,
}

impl ToolbarState {
    pub fn from_config(cfg: &EditorConfig) -> Self {
        Self {
            tool: ToolKind::Select,
            draw_color: cfg.draw_color.clone(),
            stroke_width: cfg.stroke_width,
            eraser_mode: EraserMode::Object,
            eraser_radius: cfg.eraser_radius,
            can_undo: false,
            can_redo: false,
            recording: false,
        }
    }

    pub fn with_history(mut self, status: HistoryStatus) -> Self {
        self.can_undo = status.can_undo;
        self.can_redo = status.can_redo;
        self
    }

    /// Stroke width of a pixel-erase mask: the eraser's diameter.
    pub fn mask_width(&self) -> f64 {
        self.eraser_radius * 2.0
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.stroke_width = width;
        } else {
            log::warn!("ignoring stroke width {width}");
        }
    }

    pub fn set_eraser_radius(&mut self, radius: f64) {
        if radius.is_finite() && radius > 0.0 {
            self.eraser_radius = radius;
        } else {
            log::warn!("ignoring eraser radius {radius}");
        }
    }
}

/// A fresh item for a creation tool, top-left at `at` (canvas space).
pub fn create_item(tool: ToolKind, at: Point, cfg: &EditorConfig) -> Option<CanvasItem> {
    let sizes = &cfg.default_sizes;
    let (prefix, size, kind) = match tool {
        ToolKind::Text => ("text", sizes.text, ItemKind::Text(TextData::default())),
        ToolKind::Sticky => ("sticky", sizes.sticky, ItemKind::Sticky(StickyData::default())),
        ToolKind::Table => (
            "table",
            sizes.table,
            ItemKind::Table(TableData::new(cfg.default_table_rows, cfg.default_table_cols)),
        ),
        ToolKind::Todo => (
            "todo",
            sizes.todo,
            ItemKind::Todo(TodoData {
                title: "To-do".to_string(),
                items: Vec::new(),
            }),
        ),
        ToolKind::Select | ToolKind::Draw | ToolKind::Eraser => return None,
    };
    if !at.is_finite() {
        log::warn!("not creating {prefix} at {at:?}");
        return None;
    }
    Some(CanvasItem::new(
        ItemId::generate(prefix),
        Bounds::new(at.x, at.y, size.width, size.height),
        kind,
    ))
}
