//! Per-region undo/redo for text bodies and table cells.
//!
//! Each editable region keeps a bounded list of `{content, caret}`
//! snapshots, separate from the global history. Undo/redo keystrokes
//! inside a region are routed by `LocalHistory::route`:
//!
//! 1. live content differs from the entry at the current index
//!    (something bypassed the log) → bubble to the global history;
//! 2. undo at index 0 → bubble to the global history;
//! 3. redo at the newest entry → pass the event through untouched;
//! 4. otherwise step locally and restore content and caret.
//!
//! A local restore sets a `restoring` flag so the change notification it
//! causes is not itself recorded as a new entry.

use nc_core::id::ItemId;
use nc_core::table::CellPos;
use std::collections::HashMap;

/// A rich-text widget the history can read and restore.
pub trait EditableRegion {
    /// Caret position as a plain-text character count.
    fn plain_offset(&self) -> usize;
    fn set_plain_offset(&mut self, offset: usize);
    fn serialized_content(&self) -> String;
    fn set_serialized_content(&mut self, content: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKey {
    Undo,
    Redo,
}

/// What to do with an undo/redo keystroke received inside a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRouting {
    /// Handled locally; the region now holds `content`.
    Restored { content: String },
    /// Suppress locally and dispatch to the global history.
    BubbleToGlobal,
    /// No local handling; let the event continue natively.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    content: String,
    caret: usize,
}

/// Bounded snapshot log for one region. Never empty.
#[derive(Debug, Clone)]
pub struct LocalHistory {
    entries: Vec<Snapshot>,
    index: usize,
    capacity: usize,
    restoring: bool,
}

impl LocalHistory {
    /// Seed with the region's current content at index 0.
    pub fn seeded(region: &dyn EditableRegion, capacity: usize) -> Self {
        Self::with_entry(region.serialized_content(), region.plain_offset(), capacity)
    }

    /// A single empty entry. Used after content changed through another
    /// path so the next undo is guaranteed to bubble.
    pub fn reset_empty(capacity: usize) -> Self {
        Self::with_entry(String::new(), 0, capacity)
    }

    fn with_entry(content: String, caret: usize, capacity: usize) -> Self {
        Self {
            entries: vec![Snapshot { content, caret }],
            index: 0,
            capacity: capacity.max(1),
            restoring: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Content recorded at the current index.
    pub fn current_content(&self) -> &str {
        &self.entries[self.index].content
    }

    /// Handle a content-change notification. Returns whether an entry
    /// was pushed.
    pub fn record(&mut self, region: &dyn EditableRegion) -> bool {
        let content = region.serialized_content();
        if std::mem::take(&mut self.restoring) {
            // The host may normalize restored markup; adopt its form.
            self.entries[self.index].content = content;
            return false;
        }
        if content == self.current_content() {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(Snapshot {
            content,
            caret: region.plain_offset(),
        });
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.index = self.entries.len() - 1;
        true
    }

    /// Route an undo/redo keystroke. May restore content into `region`.
    pub fn route(&mut self, key: HistoryKey, region: &mut dyn EditableRegion) -> KeyRouting {
        if region.serialized_content() != self.current_content() {
            log::warn!("local history out of sync with region; bubbling {key:?}");
            return KeyRouting::BubbleToGlobal;
        }
        match key {
            HistoryKey::Undo if self.index == 0 => return KeyRouting::BubbleToGlobal,
            HistoryKey::Redo if self.index + 1 >= self.entries.len() => {
                return KeyRouting::PassThrough;
            }
            HistoryKey::Undo => self.index -= 1,
            HistoryKey::Redo => self.index += 1,
        }
        let snap = self.entries[self.index].clone();
        self.restoring = true;
        region.set_serialized_content(&snap.content);
        region.set_plain_offset(snap.caret);
        log::trace!("local {key:?} to index {}", self.index);
        KeyRouting::Restored {
            content: snap.content,
        }
    }
}

/// Identifies one editable region: a text body, or one cell of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionKey {
    pub item: ItemId,
    pub cell: Option<CellPos>,
}

impl RegionKey {
    pub fn body(item: ItemId) -> Self {
        Self { item, cell: None }
    }

    pub fn cell(item: ItemId, pos: CellPos) -> Self {
        Self {
            item,
            cell: Some(pos),
        }
    }
}

/// Lazily created histories for every region that has had focus.
#[derive(Debug, Clone)]
pub struct LocalHistories {
    map: HashMap<RegionKey, LocalHistory>,
    capacity: usize,
}

impl LocalHistories {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity,
        }
    }

    /// History for `key`, seeded from `region` on first focus.
    pub fn focus(&mut self, key: RegionKey, region: &dyn EditableRegion) -> &mut LocalHistory {
        let capacity = self.capacity;
        self.map
            .entry(key)
            .or_insert_with(|| LocalHistory::seeded(region, capacity))
    }

    pub fn get(&self, key: &RegionKey) -> Option<&LocalHistory> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &RegionKey) -> Option<&mut LocalHistory> {
        self.map.get_mut(key)
    }

    /// Replace the history of each listed region with a single empty entry.
    pub fn reset_cells(&mut self, item: ItemId, cells: &[CellPos]) {
        for &pos in cells {
            self.map
                .insert(RegionKey::cell(item, pos), LocalHistory::reset_empty(self.capacity));
        }
    }

    /// Forget every region belonging to `item`.
    pub fn forget_item(&mut self, item: ItemId) {
        self.map.retain(|k, _| k.item != item);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain-string region with a byte caret.
    #[derive(Default)]
    struct Mock {
        content: String,
        caret: usize,
        sets: usize,
    }

    impl Mock {
        fn typed(&mut self, s: &str) {
            self.content.push_str(s);
            self.caret = self.content.len();
        }
    }

    impl EditableRegion for Mock {
        fn plain_offset(&self) -> usize {
            self.caret
        }
        fn set_plain_offset(&mut self, offset: usize) {
            self.caret = offset.min(self.content.len());
        }
        fn serialized_content(&self) -> String {
            self.content.clone()
        }
        fn set_serialized_content(&mut self, content: &str) {
            self.sets += 1;
            self.content = content.to_string();
        }
    }

    #[test]
    fn undo_at_index_zero_bubbles_without_touching_content() {
        let mut region = Mock {
            content: "seed".into(),
            ..Mock::default()
        };
        let mut h = LocalHistory::seeded(&region, 100);
        assert_eq!(h.route(HistoryKey::Undo, &mut region), KeyRouting::BubbleToGlobal);
        assert_eq!(region.content, "seed");
        assert_eq!(region.sets, 0);
    }

    #[test]
    fn local_steps_restore_content_and_caret() {
        let mut region = Mock::default();
        let mut h = LocalHistory::seeded(&region, 100);
        region.typed("a");
        h.record(&region);
        region.typed("b");
        h.record(&region);

        assert_eq!(
            h.route(HistoryKey::Undo, &mut region),
            KeyRouting::Restored { content: "a".into() }
        );
        assert_eq!((region.content.as_str(), region.caret), ("a", 1));
        // The change event caused by the restore is swallowed.
        assert!(!h.record(&region));
        assert!(!h.is_restoring());

        assert_eq!(
            h.route(HistoryKey::Redo, &mut region),
            KeyRouting::Restored { content: "ab".into() }
        );
        assert_eq!(h.route(HistoryKey::Redo, &mut region), KeyRouting::PassThrough);
    }

    #[test]
    fn desync_bubbles() {
        let mut region = Mock::default();
        let mut h = LocalHistory::seeded(&region, 100);
        region.typed("x");
        h.record(&region);
        // External paste that never reached the log.
        region.content = "pasted".into();
        assert_eq!(h.route(HistoryKey::Undo, &mut region), KeyRouting::BubbleToGlobal);
        assert_eq!(region.content, "pasted");
    }

    #[test]
    fn new_edit_after_undo_truncates_redo() {
        let mut region = Mock::default();
        let mut h = LocalHistory::seeded(&region, 100);
        region.typed("a");
        h.record(&region);
        h.route(HistoryKey::Undo, &mut region);
        h.record(&region);
        region.typed("z");
        assert!(h.record(&region));
        assert_eq!(h.len(), 2);
        assert_eq!(h.route(HistoryKey::Redo, &mut region), KeyRouting::PassThrough);
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut region = Mock::default();
        let mut h = LocalHistory::seeded(&region, 3);
        for c in ["a", "b", "c", "d"] {
            region.typed(c);
            h.record(&region);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.index(), 2);
        h.route(HistoryKey::Undo, &mut region);
        h.route(HistoryKey::Undo, &mut region);
        assert_eq!(region.content, "ab");
        assert_eq!(h.route(HistoryKey::Undo, &mut region), KeyRouting::BubbleToGlobal);
    }

    #[test]
    fn reset_cells_forces_bubble() {
        let item = ItemId::intern("lh_table");
        let pos = CellPos::new(1, 1);
        let mut all = LocalHistories::new(100);
        let mut region = Mock::default();
        all.focus(RegionKey::cell(item, pos), &region);
        region.typed("q");
        all.get_mut(&RegionKey::cell(item, pos)).unwrap().record(&region);

        all.reset_cells(item, &[pos]);
        region.content = "pasted".into();
        let h = all.get_mut(&RegionKey::cell(item, pos)).unwrap();
        assert_eq!(h.route(HistoryKey::Undo, &mut region), KeyRouting::BubbleToGlobal);

        all.forget_item(item);
        assert!(all.get(&RegionKey::cell(item, pos)).is_none());
    }
}
