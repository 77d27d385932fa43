//! Table item content: the cell grid, table/cell styles, column widths,
//! and the row/column operations that keep them consistent.
//!
//! Invariants maintained by every operation here:
//! - `rows == cells.len()` and `cols == cells[r].len()` for every row;
//! - `rows >= 1`, `cols >= 1`;
//! - every `cellStyles` key (`"row-col"`) addresses an in-range cell;
//! - `colWidths`, when present, has exactly `cols` entries.

use crate::error::{CanvasError, CanvasResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row/column address of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The `"row-col"` key used by `cellStyles`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.row, self.col)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (r, c) = key.split_once('-')?;
        Some(Self::new(r.trim().parse().ok()?, c.trim().parse().ok()?))
    }
}

/// A rectangular block of cells given by two corners in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub anchor: CellPos,
    pub focus: CellPos,
}

impl CellRange {
    #[must_use]
    pub const fn new(anchor: CellPos, focus: CellPos) -> Self {
        Self { anchor, focus }
    }

    #[must_use]
    pub const fn single(pos: CellPos) -> Self {
        Self::new(pos, pos)
    }

    pub fn top_left(&self) -> CellPos {
        CellPos::new(self.anchor.row.min(self.focus.row), self.anchor.col.min(self.focus.col))
    }

    pub fn bottom_right(&self) -> CellPos {
        CellPos::new(self.anchor.row.max(self.focus.row), self.anchor.col.max(self.focus.col))
    }

    pub fn is_single(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        let (tl, br) = (self.top_left(), self.bottom_right());
        (tl.row..=br.row).contains(&pos.row) && (tl.col..=br.col).contains(&pos.col)
    }

    /// Row-major iteration over every cell in the block.
    pub fn cells(&self) -> impl Iterator<Item = CellPos> {
        let (tl, br) = (self.top_left(), self.bottom_right());
        (tl.row..=br.row).flat_map(move |r| (tl.col..=br.col).map(move |c| CellPos::new(r, c)))
    }
}

/// Style record shared by the table level and per-cell overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscript: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superscript: Option<bool>,
}

impl CellStyle {
    /// Layer `over` on top of `self`: every field set in `over` wins.
    #[must_use]
    pub fn merged_with(&self, over: &CellStyle) -> CellStyle {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        CellStyle {
            header_color: pick(&self.header_color, &over.header_color),
            bg_color: pick(&self.bg_color, &over.bg_color),
            text_color: pick(&self.text_color, &over.text_color),
            text_align: pick(&self.text_align, &over.text_align),
            text_size: pick(&self.text_size, &over.text_size),
            font_family: pick(&self.font_family, &over.font_family),
            bold: pick(&self.bold, &over.bold),
            italic: pick(&self.italic, &over.italic),
            underline: pick(&self.underline, &over.underline),
            strikethrough: pick(&self.strikethrough, &over.strikethrough),
            subscript: pick(&self.subscript, &over.subscript),
            superscript: pick(&self.superscript, &over.superscript),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// Width of one column: absolute pixels, or a CSS length string such as
/// `"25%"`. Both historical encodings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColWidth {
    Absolute(f64),
    Css(String),
}

impl ColWidth {
    /// Percentage value, if this is a `"N%"` width.
    pub fn percent(&self) -> Option<f64> {
        match self {
            ColWidth::Css(s) => s.trim().strip_suffix('%')?.trim().parse().ok(),
            ColWidth::Absolute(_) => None,
        }
    }

    /// Resolve to pixels against the table's total width.
    pub fn resolve(&self, total_width: f64) -> Option<f64> {
        match self {
            ColWidth::Absolute(px) => Some(*px),
            ColWidth::Css(s) => match self.percent() {
                Some(pct) => Some(total_width * pct / 100.0),
                None => s.trim().trim_end_matches("px").trim().parse().ok(),
            },
        }
    }
}

/// Content of a `table` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_style: Option<String>,
    #[serde(flatten)]
    pub style: CellStyle,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cell_styles: BTreeMap<String, CellStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_border: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_widths: Option<Vec<ColWidth>>,
}

impl TableData {
    /// A fresh `rows × cols` table with a `Column N` header row.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        let (rows, cols) = (rows.max(1), cols.max(1));
        let mut cells = vec![vec![String::new(); cols]; rows];
        for (c, cell) in cells[0].iter_mut().enumerate() {
            *cell = format!("Column {}", c + 1);
        }
        Self::from_cells(cells)
    }

    /// Build from a cell grid. Ragged rows are padded with empty cells.
    #[must_use]
    pub fn from_cells(mut cells: Vec<Vec<String>>) -> Self {
        if cells.is_empty() {
            cells.push(Vec::new());
        }
        let cols = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
        for row in &mut cells {
            row.resize(cols, String::new());
        }
        Self {
            rows: cells.len(),
            cols,
            cells,
            table_style: None,
            style: CellStyle::default(),
            cell_styles: BTreeMap::new(),
            hide_border: None,
            col_widths: None,
        }
    }

    pub fn cell(&self, pos: CellPos) -> Option<&str> {
        self.cells.get(pos.row)?.get(pos.col).map(String::as_str)
    }

    /// Overwrite one cell. Returns `false` when out of range.
    pub fn set_cell(&mut self, pos: CellPos, content: impl Into<String>) -> bool {
        match self.cells.get_mut(pos.row).and_then(|r| r.get_mut(pos.col)) {
            Some(cell) => {
                *cell = content.into();
                true
            }
            None => false,
        }
    }

    pub fn in_range(&self, pos: CellPos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Clamp a range to the table's extent.
    pub fn clamp_range(&self, range: CellRange) -> CellRange {
        let (last_row, last_col) = (self.rows.saturating_sub(1), self.cols.saturating_sub(1));
        let clamp = |p: CellPos| CellPos::new(p.row.min(last_row), p.col.min(last_col));
        CellRange::new(clamp(range.anchor), clamp(range.focus))
    }

    /// Effective style for a cell: table style overlaid with the cell override.
    pub fn style_for(&self, pos: CellPos) -> CellStyle {
        match self.cell_styles.get(&pos.key()) {
            Some(over) => self.style.merged_with(over),
            None => self.style.clone(),
        }
    }

    /// Set (or with an empty style, remove) a cell override.
    pub fn set_cell_style(&mut self, pos: CellPos, style: CellStyle) -> bool {
        if !self.in_range(pos) {
            return false;
        }
        if style.is_empty() {
            self.cell_styles.remove(&pos.key());
        } else {
            self.cell_styles.insert(pos.key(), style);
        }
        true
    }

    // ─── Row / column edits ─────────────────────────────────────────────

    /// Insert a blank row before index `at` (clamped to `rows`).
    pub fn add_row(&mut self, at: usize) {
        let at = at.min(self.rows);
        self.cells.insert(at, vec![String::new(); self.cols]);
        self.rows += 1;
        self.rekey_styles(|p| Some(if p.row >= at { CellPos::new(p.row + 1, p.col) } else { p }));
    }

    /// Remove row `at`. A table never drops below one row.
    pub fn delete_row(&mut self, at: usize) -> bool {
        if self.rows <= 1 || at >= self.rows {
            return false;
        }
        self.cells.remove(at);
        self.rows -= 1;
        self.rekey_styles(|p| match p.row {
            r if r == at => None,
            r if r > at => Some(CellPos::new(r - 1, p.col)),
            _ => Some(p),
        });
        true
    }

    /// Insert a blank column before index `at` (clamped to `cols`).
    pub fn add_column(&mut self, at: usize) {
        let at = at.min(self.cols);
        for row in &mut self.cells {
            row.insert(at, String::new());
        }
        self.cols += 1;
        self.rekey_styles(|p| Some(if p.col >= at { CellPos::new(p.row, p.col + 1) } else { p }));
        if let Some(widths) = &mut self.col_widths {
            let neighbour = widths
                .get(at.saturating_sub(1))
                .or_else(|| widths.first())
                .cloned()
                .unwrap_or(ColWidth::Absolute(120.0));
            widths.insert(at.min(widths.len()), neighbour);
        }
        self.rebalance_percentages();
    }

    /// Remove column `at`. A table never drops below one column.
    pub fn delete_column(&mut self, at: usize) -> bool {
        if self.cols <= 1 || at >= self.cols {
            return false;
        }
        for row in &mut self.cells {
            row.remove(at);
        }
        self.cols -= 1;
        self.rekey_styles(|p| match p.col {
            c if c == at => None,
            c if c > at => Some(CellPos::new(p.row, c - 1)),
            _ => Some(p),
        });
        if let Some(widths) = &mut self.col_widths {
            if at < widths.len() {
                widths.remove(at);
            }
        }
        self.rebalance_percentages();
        true
    }

    fn rekey_styles(&mut self, map: impl Fn(CellPos) -> Option<CellPos>) {
        let old = std::mem::take(&mut self.cell_styles);
        for (key, style) in old {
            if let Some(pos) = CellPos::from_key(&key).and_then(&map) {
                if self.in_range(pos) {
                    self.cell_styles.insert(pos.key(), style);
                }
            }
        }
    }

    /// When every column width is a percentage, scale them to sum to 100%.
    fn rebalance_percentages(&mut self) {
        let Some(widths) = &mut self.col_widths else {
            return;
        };
        let pcts: Option<Vec<f64>> = widths.iter().map(ColWidth::percent).collect();
        if let Some(pcts) = pcts {
            let total: f64 = pcts.iter().sum();
            if total > 0.0 {
                *widths = pcts
                    .iter()
                    .map(|p| ColWidth::Css(format!("{}%", (p / total * 10_000.0).round() / 100.0)))
                    .collect();
            }
        }
    }

    // ─── Block operations ───────────────────────────────────────────────

    /// Copy the rectangular block covered by `range`.
    pub fn block(&self, range: CellRange) -> Vec<Vec<String>> {
        let range = self.clamp_range(range);
        let (tl, br) = (range.top_left(), range.bottom_right());
        (tl.row..=br.row)
            .filter_map(|r| self.cells.get(r))
            .filter_map(|row| row.get(tl.col..=br.col).map(<[String]>::to_vec))
            .collect()
    }

    /// Empty every cell in `range`; returns the cells that actually changed.
    pub fn clear_range(&mut self, range: CellRange) -> Vec<CellPos> {
        let range = self.clamp_range(range);
        let mut changed = Vec::new();
        for pos in range.cells() {
            let Some(cell) = self.cells.get_mut(pos.row).and_then(|row| row.get_mut(pos.col)) else {
                continue;
            };
            if !cell.is_empty() {
                cell.clear();
                changed.push(pos);
            }
        }
        changed
    }

    /// Write `block` with its top-left at `at`, growing the table when the
    /// block overhangs. Returns every cell written.
    pub fn paste_block(&mut self, at: CellPos, block: &[Vec<String>]) -> Vec<CellPos> {
        let height = block.len();
        let width = block.iter().map(Vec::len).max().unwrap_or(0);
        if height == 0 || width == 0 {
            return Vec::new();
        }
        while self.rows < at.row + height {
            self.add_row(self.rows);
        }
        while self.cols < at.col + width {
            self.add_column(self.cols);
        }
        let mut written = Vec::with_capacity(height * width);
        for (dr, row) in block.iter().enumerate() {
            for (dc, value) in row.iter().enumerate() {
                let pos = CellPos::new(at.row + dr, at.col + dc);
                self.cells[pos.row][pos.col].clone_from(value);
                written.push(pos);
            }
        }
        written
    }

    /// Check every table invariant.
    pub fn validate(&self) -> CanvasResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(CanvasError::InvalidTable("table must be at least 1×1".into()));
        }
        if self.cells.len() != self.rows {
            return Err(CanvasError::InvalidTable(format!(
                "rows = {} but {} cell rows",
                self.rows,
                self.cells.len()
            )));
        }
        if let Some(r) = self.cells.iter().position(|row| row.len() != self.cols) {
            return Err(CanvasError::InvalidTable(format!(
                "row {r} has {} cells, expected {}",
                self.cells[r].len(),
                self.cols
            )));
        }
        for key in self.cell_styles.keys() {
            match CellPos::from_key(key) {
                Some(pos) if self.in_range(pos) => {}
                _ => {
                    return Err(CanvasError::InvalidTable(format!(
                        "cell style key {key:?} out of range"
                    )));
                }
            }
        }
        if let Some(widths) = &self.col_widths {
            if widths.len() != self.cols {
                return Err(CanvasError::InvalidTable(format!(
                    "{} column widths for {} columns",
                    widths.len(),
                    self.cols
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[test]
    fn block_ops_on_empty_grid_are_no_ops() {
        let mut t = TableData::new(1, 1);
        t.rows = 0;
        t.cols = 0;
        t.cells.clear();
        let range = CellRange::new(CellPos::new(2, 3), CellPos::new(0, 0));
        assert_eq!(t.clamp_range(range), CellRange::new(CellPos::new(0, 0), CellPos::new(0, 0)));
        assert!(t.block(range).is_empty());
        assert!(t.clear_range(range).is_empty());
    }

    #[test]
    fn new_table_has_header_row() {
        let t = TableData::new(3, 2);
        assert_eq!(t.cells, grid(&[&["Column 1", "Column 2"], &["", ""], &["", ""]]));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn add_row_inserts_blank_row_and_shifts_content() {
        let mut t = TableData::from_cells(grid(&[
            &["Column 1", "Column 2", "Column 3"],
            &["", "", " "],
            &["", "", ""],
        ]));
        t.add_row(1);
        assert_eq!(t.rows, 4);
        assert_eq!(t.cells[1], vec![String::new(); 3]);
        assert_eq!(t.cells[2], vec!["".to_string(), "".to_string(), " ".to_string()]);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn row_ops_rekey_cell_styles() {
        let mut t = TableData::new(3, 2);
        let red = CellStyle {
            bg_color: Some("red".into()),
            ..CellStyle::default()
        };
        t.set_cell_style(CellPos::new(2, 1), red.clone());
        t.set_cell_style(CellPos::new(1, 0), red.clone());

        t.add_row(0);
        assert!(t.cell_styles.contains_key("3-1"));
        assert!(t.cell_styles.contains_key("2-0"));

        assert!(t.delete_row(2));
        assert!(!t.cell_styles.contains_key("2-0"));
        assert_eq!(t.cell_styles.get("2-1"), Some(&red));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn column_ops_keep_widths_in_step() {
        let mut t = TableData::new(2, 2);
        t.col_widths = Some(vec![ColWidth::Css("50%".into()), ColWidth::Css("50%".into())]);
        t.add_column(1);
        assert_eq!(t.cols, 3);
        let widths = t.col_widths.clone().unwrap();
        assert_eq!(widths.len(), 3);
        let total: f64 = widths.iter().filter_map(ColWidth::percent).sum();
        assert!((total - 100.0).abs() < 0.05, "percentages sum to {total}");

        assert!(t.delete_column(0));
        assert_eq!(t.col_widths.as_ref().map(Vec::len), Some(2));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn table_never_shrinks_below_one_cell() {
        let mut t = TableData::new(1, 1);
        assert!(!t.delete_row(0));
        assert!(!t.delete_column(0));
        assert_eq!((t.rows, t.cols), (1, 1));
    }

    #[test]
    fn block_copy_and_clear() {
        let mut t = TableData::from_cells(grid(&[&["a", "b", "c"], &["d", "e", "f"]]));
        let range = CellRange::new(CellPos::new(1, 2), CellPos::new(0, 1));
        assert_eq!(t.block(range), grid(&[&["b", "c"], &["e", "f"]]));
        let cleared = t.clear_range(range);
        assert_eq!(cleared.len(), 4);
        assert_eq!(t.cells, grid(&[&["a", "", ""], &["d", "", ""]]));
    }

    #[test]
    fn paste_block_grows_table() {
        let mut t = TableData::new(2, 2);
        let written = t.paste_block(CellPos::new(1, 1), &grid(&[&["x", "y"], &["z", "w"]]));
        assert_eq!(written.len(), 4);
        assert_eq!((t.rows, t.cols), (3, 3));
        assert_eq!(t.cell(CellPos::new(2, 2)), Some("w"));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn style_for_merges_override() {
        let mut t = TableData::new(2, 2);
        t.style.text_color = Some("#111".into());
        t.style.bold = Some(true);
        t.set_cell_style(
            CellPos::new(1, 1),
            CellStyle {
                text_color: Some("#f00".into()),
                ..CellStyle::default()
            },
        );
        let s = t.style_for(CellPos::new(1, 1));
        assert_eq!(s.text_color.as_deref(), Some("#f00"));
        assert_eq!(s.bold, Some(true));
        assert_eq!(t.style_for(CellPos::new(0, 0)).text_color.as_deref(), Some("#111"));
    }

    #[test]
    fn validate_rejects_out_of_range_style_keys() {
        let mut t = TableData::new(2, 2);
        t.cell_styles.insert("5-0".into(), CellStyle::default());
        assert!(matches!(t.validate(), Err(CanvasError::InvalidTable(_))));
    }

    #[test]
    fn col_width_resolution() {
        assert_eq!(ColWidth::Absolute(80.0).resolve(400.0), Some(80.0));
        assert_eq!(ColWidth::Css("25%".into()).resolve(400.0), Some(100.0));
        assert_eq!(ColWidth::Css("90px".into()).resolve(400.0), Some(90.0));
        assert_eq!(ColWidth::Css("wide".into()).resolve(400.0), None);
    }
}
