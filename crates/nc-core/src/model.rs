//! Canvas item data model.
//!
//! A page owns a flat list of `CanvasItem`s. Each item carries common
//! geometry (top-left `x`/`y` and `width`/`height`, canvas space) and an
//! `ItemKind` payload discriminated by the JSON `type` field. New variants
//! are added to the enum; every consumer matches exhaustively.

use crate::error::{CanvasError, CanvasResult};
use crate::geometry::{Bounds, Point};
use crate::id::ItemId;
use crate::path::{scale_path, translate_path};
use crate::table::TableData;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Sticky colors ───────────────────────────────────────────────────────

/// Named sticky-note colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StickyPalette {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Purple,
    Orange,
    Gray,
}

impl StickyPalette {
    pub const ALL: [StickyPalette; 7] = [
        StickyPalette::Yellow,
        StickyPalette::Pink,
        StickyPalette::Blue,
        StickyPalette::Green,
        StickyPalette::Purple,
        StickyPalette::Orange,
        StickyPalette::Gray,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StickyPalette::Yellow => "yellow",
            StickyPalette::Pink => "pink",
            StickyPalette::Blue => "blue",
            StickyPalette::Green => "green",
            StickyPalette::Purple => "purple",
            StickyPalette::Orange => "orange",
            StickyPalette::Gray => "gray",
        }
    }

    pub fn css(self) -> &'static str {
        match self {
            StickyPalette::Yellow => "#fef08a",
            StickyPalette::Pink => "#fbcfe8",
            StickyPalette::Blue => "#bfdbfe",
            StickyPalette::Green => "#bbf7d0",
            StickyPalette::Purple => "#e9d5ff",
            StickyPalette::Orange => "#fed7aa",
            StickyPalette::Gray => "#e5e7eb",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// A sticky's background: either a palette key (`"yellow"`) or a literal
/// CSS color (`"#fde68a"`). Pages written by older versions store either,
/// and both are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StickyColor {
    Palette(StickyPalette),
    Literal(String),
}

impl Default for StickyColor {
    fn default() -> Self {
        StickyColor::Palette(StickyPalette::default())
    }
}

impl StickyColor {
    /// Resolve to a CSS color value.
    pub fn css(&self) -> &str {
        match self {
            StickyColor::Palette(p) => p.css(),
            StickyColor::Literal(s) => s,
        }
    }
}

impl From<String> for StickyColor {
    fn from(s: String) -> Self {
        match StickyPalette::from_key(s.trim()) {
            Some(p) => StickyColor::Palette(p),
            None => StickyColor::Literal(s),
        }
    }
}

impl From<StickyColor> for String {
    fn from(c: StickyColor) -> Self {
        match c {
            StickyColor::Palette(p) => p.key().to_string(),
            StickyColor::Literal(s) => s,
        }
    }
}

// ─── Variant payloads ────────────────────────────────────────────────────

/// Rich-text box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    /// Serialized rich-text markup.
    pub content: String,
    /// Display order is insertion order; membership ignores order.
    #[serde(default)]
    pub tags: SmallVec<[String; 4]>,
}

impl TextData {
    /// Add a tag unless already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyData {
    pub content: String,
    #[serde(default)]
    pub color: StickyColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoEntry {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoData {
    pub title: String,
    #[serde(default)]
    pub items: Vec<TodoEntry>,
}

impl TodoData {
    /// Append an entry and return its id.
    pub fn add_entry(&mut self, text: impl Into<String>) -> String {
        let id = ItemId::generate("todo_entry").as_str().to_string();
        self.items.push(TodoEntry {
            id: id.clone(),
            text: text.into(),
            completed: false,
        });
        id
    }

    pub fn toggle_entry(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.completed = !entry.completed;
                true
            }
            None => false,
        }
    }

    pub fn set_entry_text(&mut self, id: &str, text: impl Into<String>) -> bool {
        match self.items.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_entry(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|e| e.id != id);
        self.items.len() != before
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|e| e.completed).count()
    }
}

/// Payload shared by `media`, `image`, `audio`, `video`, and `file` items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaData {
    /// Resource locator, typically a data URI.
    pub url: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// One pixel-erase stroke layered over a drawing as a mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskPath {
    pub path: String,
    pub stroke_width: f64,
}

/// Freehand drawing. `paths` holds canvas-space coordinates; the item's
/// bounds enclose them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingData {
    pub paths: String,
    pub color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mask_paths: Vec<MaskPath>,
}

impl DrawingData {
    fn map_paths(&self, f: impl Fn(&str) -> CanvasResult<String>) -> DrawingData {
        let apply = |p: &str| {
            f(p).unwrap_or_else(|e| {
                log::warn!("leaving malformed drawing path untouched: {e}");
                p.to_string()
            })
        };
        DrawingData {
            paths: apply(&self.paths),
            color: self.color.clone(),
            stroke_width: self.stroke_width,
            mask_paths: self
                .mask_paths
                .iter()
                .map(|m| MaskPath {
                    path: apply(&m.path),
                    stroke_width: m.stroke_width,
                })
                .collect(),
        }
    }
}

// ─── Canvas items ────────────────────────────────────────────────────────

/// Per-variant content, tagged by `type` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ItemKind {
    Text(TextData),
    Sticky(StickyData),
    Table(TableData),
    Todo(TodoData),
    Media(MediaData),
    Image(MediaData),
    Audio(MediaData),
    Video(MediaData),
    File(MediaData),
    Drawing(DrawingData),
}

impl ItemKind {
    /// The JSON `type` discriminant.
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Text(_) => "text",
            ItemKind::Sticky(_) => "sticky",
            ItemKind::Table(_) => "table",
            ItemKind::Todo(_) => "todo",
            ItemKind::Media(_) => "media",
            ItemKind::Image(_) => "image",
            ItemKind::Audio(_) => "audio",
            ItemKind::Video(_) => "video",
            ItemKind::File(_) => "file",
            ItemKind::Drawing(_) => "drawing",
        }
    }

    pub fn media(&self) -> Option<&MediaData> {
        match self {
            ItemKind::Media(m)
            | ItemKind::Image(m)
            | ItemKind::Audio(m)
            | ItemKind::Video(m)
            | ItemKind::File(m) => Some(m),
            _ => None,
        }
    }
}

/// One positioned widget on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasItem {
    pub id: ItemId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl CanvasItem {
    pub fn new(id: ItemId, bounds: Bounds, kind: ItemKind) -> Self {
        Self {
            id,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            kind,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.x, self.y, self.width, self.height)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn as_text(&self) -> Option<&TextData> {
        match &self.kind {
            ItemKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableData> {
        match &self.kind {
            ItemKind::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableData> {
        match &mut self.kind {
            ItemKind::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_drawing(&self) -> Option<&DrawingData> {
        match &self.kind {
            ItemKind::Drawing(d) => Some(d),
            _ => None,
        }
    }

    /// Copy of this item with its top-left at `(x, y)`. Drawing strokes
    /// and masks are translated along with the box.
    #[must_use]
    pub fn moved_to(&self, x: f64, y: f64) -> CanvasItem {
        let (dx, dy) = (x - self.x, y - self.y);
        let kind = match &self.kind {
            ItemKind::Drawing(d) if dx != 0.0 || dy != 0.0 => {
                ItemKind::Drawing(d.map_paths(|p| translate_path(p, dx, dy)))
            }
            other => other.clone(),
        };
        CanvasItem { x, y, kind, ..self.clone() }
    }

    /// Copy of this item with a new size. Drawing strokes are scaled about
    /// the top-left corner so they keep filling the box.
    #[must_use]
    pub fn resized_to(&self, width: f64, height: f64) -> CanvasItem {
        let kind = match &self.kind {
            ItemKind::Drawing(d) if self.width > 0.0 && self.height > 0.0 => {
                let (sx, sy) = (width / self.width, height / self.height);
                let origin = self.position();
                ItemKind::Drawing(d.map_paths(|p| scale_path(p, origin, sx, sy)))
            }
            other => other.clone(),
        };
        CanvasItem { width, height, kind, ..self.clone() }
    }

    /// Check the geometric and per-variant invariants.
    pub fn validate(&self) -> CanvasResult<()> {
        let geometry = [self.x, self.y, self.width, self.height];
        if geometry.iter().any(|v| !v.is_finite()) {
            return Err(CanvasError::InvalidGeometry(format!(
                "{} has non-finite geometry",
                self.id
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(CanvasError::InvalidGeometry(format!(
                "{} has non-positive size {}×{}",
                self.id, self.width, self.height
            )));
        }
        match &self.kind {
            ItemKind::Table(t) => t.validate(),
            ItemKind::Drawing(d) if !d.stroke_width.is_finite() || d.stroke_width < 0.0 => Err(
                CanvasError::InvalidGeometry(format!("{} has invalid stroke width", self.id)),
            ),
            _ => Ok(()),
        }
    }
}

/// Partial update applied through the page store.
///
/// Geometry fields move or resize the live item; `kind` replaces its
/// content wholesale. `ItemPatch::replace` carries a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ItemKind>,
}

impl ItemPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn content(kind: ItemKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Full replacement with `item`'s geometry and content.
    pub fn replace(item: &CanvasItem) -> Self {
        Self {
            x: Some(item.x),
            y: Some(item.y),
            width: Some(item.width),
            height: Some(item.height),
            kind: Some(item.kind.clone()),
        }
    }

    /// Produce the updated item. With `kind` present the fields are set
    /// verbatim; otherwise geometry goes through `moved_to`/`resized_to`.
    pub fn apply_to(&self, item: &CanvasItem) -> CanvasItem {
        if let Some(kind) = &self.kind {
            return CanvasItem {
                id: item.id,
                x: self.x.unwrap_or(item.x),
                y: self.y.unwrap_or(item.y),
                width: self.width.unwrap_or(item.width),
                height: self.height.unwrap_or(item.height),
                kind: kind.clone(),
            };
        }
        let mut out = item.clone();
        if self.width.is_some() || self.height.is_some() {
            out = out.resized_to(self.width.unwrap_or(out.width), self.height.unwrap_or(out.height));
        }
        if self.x.is_some() || self.y.is_some() {
            out = out.moved_to(self.x.unwrap_or(out.x), self.y.unwrap_or(out.y));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sticky_color_accepts_both_representations() {
        let keyed: StickyData =
            serde_json::from_str(r#"{"content":"hi","color":"pink"}"#).unwrap();
        assert_eq!(keyed.color, StickyColor::Palette(StickyPalette::Pink));
        assert_eq!(keyed.color.css(), "#fbcfe8");

        let literal: StickyData =
            serde_json::from_str(r##"{"content":"hi","color":"#abcdef"}"##).unwrap();
        assert_eq!(literal.color, StickyColor::Literal("#abcdef".into()));
        assert_eq!(literal.color.css(), "#abcdef");

        let back = serde_json::to_value(&keyed).unwrap();
        assert_eq!(back["color"], "pink");
    }

    #[test]
    fn item_json_uses_type_discriminant() {
        let json = r#"{
            "id": "t1", "type": "text", "x": 10, "y": 20, "width": 200, "height": 80,
            "content": "<b>hello</b>", "tags": ["work", "draft"]
        }"#;
        let item: CanvasItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.type_name(), "text");
        assert_eq!(item.as_text().unwrap().tags.as_slice(), ["work", "draft"]);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["id"], "t1");
    }

    #[test]
    fn table_item_roundtrip_keeps_style_fields() {
        let json = r##"{
            "id": "tb", "type": "table", "x": 0, "y": 0, "width": 300, "height": 120,
            "rows": 2, "cols": 2, "cells": [["A","B"],["",""]],
            "headerColor": "#eee", "textAlign": "center",
            "cellStyles": {"1-1": {"bold": true}},
            "colWidths": [120, "60%"]
        }"##;
        let item: CanvasItem = serde_json::from_str(json).unwrap();
        let table = item.as_table().unwrap();
        assert_eq!(table.style.header_color.as_deref(), Some("#eee"));
        assert_eq!(table.cell_styles["1-1"].bold, Some(true));
        assert!(item.validate().is_ok());

        let again: CanvasItem =
            serde_json::from_str(&serde_json::to_string(&item).unwrap()).unwrap();
        assert_eq!(again, item);
    }

    #[test]
    fn moving_a_drawing_translates_strokes_and_masks() {
        let item = CanvasItem::new(
            ItemId::intern("d1"),
            Bounds::new(10.0, 10.0, 20.0, 20.0),
            ItemKind::Drawing(DrawingData {
                paths: "M 10 10 L 20 20".into(),
                color: "#000".into(),
                stroke_width: 2.0,
                mask_paths: vec![MaskPath {
                    path: "M 12 12 L 14 14".into(),
                    stroke_width: 8.0,
                }],
            }),
        );
        let moved = item.moved_to(15.0, 5.0);
        let d = moved.as_drawing().unwrap();
        assert_eq!(d.paths, "M 15 5 L 25 15");
        assert_eq!(d.mask_paths[0].path, "M 17 7 L 19 9");
    }

    #[test]
    fn validate_rejects_nan_and_empty_size() {
        let mut item = CanvasItem::new(
            ItemId::intern("s1"),
            Bounds::new(0.0, 0.0, 150.0, 100.0),
            ItemKind::Sticky(StickyData::default()),
        );
        assert!(item.validate().is_ok());
        item.x = f64::NAN;
        assert!(matches!(item.validate(), Err(CanvasError::InvalidGeometry(_))));
        item.x = 0.0;
        item.height = 0.0;
        assert!(item.validate().is_err());
    }

    #[test]
    fn patch_without_kind_moves_and_resizes() {
        let item = CanvasItem::new(
            ItemId::intern("s2"),
            Bounds::new(0.0, 0.0, 150.0, 100.0),
            ItemKind::Sticky(StickyData::default()),
        );
        let out = ItemPatch::position(5.0, 6.0).apply_to(&item);
        assert_eq!((out.x, out.y, out.width), (5.0, 6.0, 150.0));
        let out = ItemPatch::replace(&out).apply_to(&item);
        assert_eq!(out.position(), Point::new(5.0, 6.0));
    }

    #[test]
    fn text_tags_keep_insertion_order_without_duplicates() {
        let mut t = TextData::default();
        assert!(t.add_tag("b"));
        assert!(t.add_tag("a"));
        assert!(!t.add_tag("b"));
        assert_eq!(t.tags.as_slice(), ["b", "a"]);
        assert!(t.remove_tag("b"));
        assert!(!t.remove_tag("zzz"));
    }

    #[test]
    fn todo_entry_lifecycle() {
        let mut todo = TodoData::default();
        let id = todo.add_entry("write tests");
        assert!(todo.toggle_entry(&id));
        assert_eq!(todo.completed_count(), 1);
        assert!(todo.set_entry_text(&id, "write more tests"));
        assert!(todo.remove_entry(&id));
        assert!(todo.items.is_empty());
    }
}
