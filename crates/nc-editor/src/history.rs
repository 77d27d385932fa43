//! Global undo/redo: one timeline of whole-item actions for the canvas.
//!
//! Every action carries full item snapshots, so undo and redo never need
//! an inverse computation. They re-read the active page from the store
//! right before applying, never trusting a page captured earlier.
//!
//! Coalescing: an `Update` recorded directly on top of an `Add` for the
//! same item replaces that `Add`, so "create then edit" is one step.

use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, ItemPatch};
use nc_core::store::{PageKey, PageStore};
use nc_core::CanvasError;
use serde::Serialize;

/// One undoable action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Add { item: CanvasItem },
    Delete { item: CanvasItem },
    #[serde(rename_all = "camelCase")]
    Update {
        prev_item: CanvasItem,
        new_item: CanvasItem,
    },
}

impl HistoryAction {
    pub fn item_id(&self) -> ItemId {
        match self {
            HistoryAction::Add { item } | HistoryAction::Delete { item } => item.id,
            HistoryAction::Update { new_item, .. } => new_item.id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HistoryAction::Add { .. } => "ADD",
            HistoryAction::Delete { .. } => "DELETE",
            HistoryAction::Update { .. } => "UPDATE",
        }
    }
}

/// Availability flags pushed to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
}

type Observer = Box<dyn FnMut(HistoryStatus)>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Undo and redo stacks of `HistoryAction`s. Unbounded.
#[derive(Default)]
pub struct GlobalHistory {
    undo_stack: Vec<HistoryAction>,
    redo_stack: Vec<HistoryAction>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl std::fmt::Debug for GlobalHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalHistory")
            .field("undo_stack", &self.undo_stack)
            .field("redo_stack", &self.redo_stack)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl GlobalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_add(&mut self, item: CanvasItem) {
        self.push(HistoryAction::Add { item });
    }

    pub fn record_delete(&mut self, item: CanvasItem) {
        self.push(HistoryAction::Delete { item });
    }

    pub fn record_update(&mut self, prev_item: CanvasItem, new_item: CanvasItem) {
        self.push(HistoryAction::Update { prev_item, new_item });
    }

    /// Push an action, applying the coalescing rule and clearing redo.
    pub fn push(&mut self, action: HistoryAction) {
        let action = match action {
            HistoryAction::Update { new_item, .. } if self.top_is_add_of(new_item.id) => {
                log::debug!("coalesce UPDATE into ADD {}", new_item.id);
                self.undo_stack.pop();
                HistoryAction::Add { item: new_item }
            }
            other => other,
        };
        log::debug!("push {} {}", action.label(), action.item_id());
        self.undo_stack.push(action);
        self.redo_stack.clear();
        self.notify();
    }

    fn top_is_add_of(&self, id: ItemId) -> bool {
        matches!(self.undo_stack.last(), Some(HistoryAction::Add { item }) if item.id == id)
    }

    /// Undo the most recent action against the store's active page.
    /// Returns the affected item id, or `None` if nothing happened.
    pub fn undo<S: PageStore>(&mut self, store: &mut S) -> Option<ItemId> {
        let page = store.active_page()?;
        let action = self.undo_stack.pop()?;
        apply_inverse(store, &page.key, &action);
        let id = action.item_id();
        log::debug!("undo {} {id}", action.label());
        self.redo_stack.push(action);
        self.notify();
        Some(id)
    }

    /// Re-apply the most recently undone action.
    pub fn redo<S: PageStore>(&mut self, store: &mut S) -> Option<ItemId> {
        let page = store.active_page()?;
        let action = self.redo_stack.pop()?;
        apply_forward(store, &page.key, &action);
        let id = action.item_id();
        log::debug!("redo {} {id}", action.label());
        self.undo_stack.push(action);
        self.notify();
        Some(id)
    }

    /// Drop both stacks (e.g. when the active page changes).
    pub fn clear(&mut self) {
        if self.undo_stack.is_empty() && self.redo_stack.is_empty() {
            return;
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn last(&self) -> Option<&HistoryAction> {
        self.undo_stack.last()
    }

    /// Register an observer. It is called synchronously after every push,
    /// undo, redo, and clear.
    pub fn subscribe(&mut self, observer: impl FnMut(HistoryStatus) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        let status = self.status();
        for (_, observer) in &mut self.observers {
            observer(status);
        }
    }
}

// ─── Applying actions ───────────────────────────────────────────────────

fn apply_inverse<S: PageStore>(store: &mut S, key: &PageKey, action: &HistoryAction) {
    match action {
        HistoryAction::Add { item } => remove(store, key, item.id),
        HistoryAction::Delete { item } => insert(store, key, item),
        HistoryAction::Update { prev_item, .. } => overwrite(store, key, prev_item),
    }
}

fn apply_forward<S: PageStore>(store: &mut S, key: &PageKey, action: &HistoryAction) {
    match action {
        HistoryAction::Add { item } => insert(store, key, item),
        HistoryAction::Delete { item } => remove(store, key, item.id),
        HistoryAction::Update { new_item, .. } => overwrite(store, key, new_item),
    }
}

fn insert<S: PageStore>(store: &mut S, key: &PageKey, item: &CanvasItem) {
    match store.add_canvas_item(key, item.clone()) {
        Ok(()) => {}
        Err(CanvasError::DuplicateItem(id)) => log::warn!("{id} already on {key}; left as is"),
        Err(e) => log::warn!("cannot restore {}: {e}", item.id),
    }
}

fn remove<S: PageStore>(store: &mut S, key: &PageKey, id: ItemId) {
    if let Err(e) = store.delete_canvas_item(key, id) {
        log::warn!("cannot remove {id}: {e}");
    }
}

fn overwrite<S: PageStore>(store: &mut S, key: &PageKey, item: &CanvasItem) {
    if let Err(e) = store.update_canvas_item(key, item.id, &ItemPatch::replace(item)) {
        log::warn!("cannot write back {}: {e}", item.id);
    }
}
