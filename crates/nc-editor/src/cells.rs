//! Table cell editing: keyboard navigation between cells, range
//! selection, and the clipboard formats for cell blocks.

use crate::input::Modifiers;
use crate::richtext::{RichNode, markup_plain_text, parse_markup, to_markup};
use nc_core::id::ItemId;
use nc_core::table::{CellPos, CellRange, TableData};
use serde::Serialize;

// ─── Navigation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Left,
    Right,
    Up,
    Down,
    Tab,
    ShiftTab,
    Enter,
    CtrlEnter,
}

impl NavKey {
    pub fn from_key(key: &str, modifiers: Modifiers) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(NavKey::Left),
            "ArrowRight" => Some(NavKey::Right),
            "ArrowUp" => Some(NavKey::Up),
            "ArrowDown" => Some(NavKey::Down),
            "Tab" if modifiers.shift => Some(NavKey::ShiftTab),
            "Tab" => Some(NavKey::Tab),
            "Enter" if modifiers.command() => Some(NavKey::CtrlEnter),
            "Enter" if !modifiers.shift => Some(NavKey::Enter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// Move focus to this cell.
    Focus(CellPos),
    /// Append a row at the end, then focus this cell in it.
    AppendRow(CellPos),
    /// Keep focus where it is; the key acts inside the cell.
    Stay,
}

/// Where `key` takes the focus from `from` in a `rows × cols` grid.
///
/// Arrow keys only leave a cell when the caret sits at the matching text
/// boundary. Horizontal moves wrap across row ends.
pub fn navigate(
    rows: usize,
    cols: usize,
    from: CellPos,
    key: NavKey,
    caret_at_start: bool,
    caret_at_end: bool,
) -> NavOutcome {
    let last_row = rows.saturating_sub(1);
    let last_col = cols.saturating_sub(1);
    let next = || {
        if from.col < last_col {
            Some(CellPos::new(from.row, from.col + 1))
        } else if from.row < last_row {
            Some(CellPos::new(from.row + 1, 0))
        } else {
            None
        }
    };
    let prev = || {
        if from.col > 0 {
            Some(CellPos::new(from.row, from.col - 1))
        } else if from.row > 0 {
            Some(CellPos::new(from.row - 1, last_col))
        } else {
            None
        }
    };
    let down = || (from.row < last_row).then(|| CellPos::new(from.row + 1, from.col));
    let up = || (from.row > 0).then(|| CellPos::new(from.row - 1, from.col));

    let target = match key {
        NavKey::Left if caret_at_start => prev(),
        NavKey::Right if caret_at_end => next(),
        NavKey::Up if caret_at_start => up(),
        NavKey::Down if caret_at_end => down(),
        NavKey::Left | NavKey::Right | NavKey::Up | NavKey::Down => None,
        NavKey::Tab => next(),
        NavKey::ShiftTab => prev(),
        NavKey::Enter => down(),
        NavKey::CtrlEnter if from.row >= last_row => {
            return NavOutcome::AppendRow(CellPos::new(rows, from.col));
        }
        NavKey::CtrlEnter => down(),
    };
    target.map_or(NavOutcome::Stay, NavOutcome::Focus)
}

// ─── Range selection ────────────────────────────────────────────────────

/// Mouse-driven cell range selection. Moves are tracked for the whole
/// gesture, wherever the pointer goes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellSelection {
    tracking: bool,
    current: Option<(ItemId, CellRange)>,
}

impl CellSelection {
    pub fn mouse_down(&mut self, item: ItemId, pos: CellPos) {
        self.current = Some((item, CellRange::single(pos)));
        self.tracking = true;
    }

    /// Extend the free end to the cell under the pointer. Returns `true`
    /// on the move that turns a single cell into a multi-cell range.
    pub fn mouse_move(&mut self, under: Option<(ItemId, CellPos)>) -> bool {
        if !self.tracking {
            return false;
        }
        let (Some((item, range)), Some((id, pos))) = (self.current.as_mut(), under) else {
            return false;
        };
        if *item != id {
            return false;
        }
        let was_single = range.is_single();
        range.focus = pos;
        was_single && !range.is_single()
    }

    pub fn mouse_up(&mut self) {
        self.tracking = false;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn range(&self) -> Option<(ItemId, CellRange)> {
        self.current
    }

    pub fn is_multi(&self) -> bool {
        self.current.is_some_and(|(_, r)| !r.is_single())
    }

    pub fn clear(&mut self) {
        self.tracking = false;
        self.current = None;
    }
}

// ─── Clipboard ──────────────────────────────────────────────────────────

/// Both clipboard flavors for a copied block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipboardPayload {
    /// Tab-separated rows, newline-separated.
    pub plain: String,
    /// An HTML `<table>` fragment carrying the cell markup.
    pub html: String,
}

/// Serialize the block under `range`.
pub fn copy_block(table: &TableData, range: CellRange) -> ClipboardPayload {
    let block = table.block(range);
    let plain = block
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| markup_plain_text(cell).replace(['\t', '\n', '\r'], " "))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut html = String::from("<table><tbody>");
    for row in &block {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(cell);
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");

    ClipboardPayload { plain, html }
}

fn find_element<'a>(nodes: &'a [RichNode], wanted: &str) -> Option<&'a [RichNode]> {
    nodes.iter().find_map(|node| match node {
        RichNode::Element { tag, children, .. } if tag == wanted => Some(children.as_slice()),
        RichNode::Element { children, .. } => find_element(children, wanted),
        RichNode::Text(_) => None,
    })
}

/// `tr` elements of a table body, not descending into nested tables.
fn collect_rows<'a>(nodes: &'a [RichNode], out: &mut Vec<&'a [RichNode]>) {
    for node in nodes {
        if let RichNode::Element { tag, children, .. } = node {
            match tag.as_str() {
                "tr" => out.push(children),
                "table" => {}
                _ => collect_rows(children, out),
            }
        }
    }
}

/// Cell markup grid from an HTML table fragment. `None` when the HTML
/// holds no table rows.
pub fn parse_html_table(html: &str) -> Option<Vec<Vec<String>>> {
    let nodes = parse_markup(html);
    let table = find_element(&nodes, "table")?;
    let mut rows = Vec::new();
    collect_rows(table, &mut rows);
    let grid: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| {
            row.iter()
                .filter_map(|cell| match cell {
                    RichNode::Element { tag, children, .. } if tag == "td" || tag == "th" => {
                        Some(to_markup(children).trim().to_string())
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    (!grid.is_empty()).then_some(grid)
}

/// Escape plain text for storage as cell markup.
pub fn plain_to_markup(text: &str) -> String {
    to_markup(&[RichNode::Text(text.to_string())])
}

/// Cell grid from tab-separated text.
pub fn parse_tsv(plain: &str) -> Vec<Vec<String>> {
    let mut lines: Vec<&str> = plain.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
        .into_iter()
        .map(|line| line.split('\t').map(plain_to_markup).collect())
        .collect()
}
