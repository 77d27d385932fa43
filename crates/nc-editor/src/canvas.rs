//! The canvas session: one active page, its tools, and both histories.
//!
//! `CanvasSession` owns every piece of gesture state (drag/resize,
//! stroke capture, cell range selection, pinch) and routes host input to
//! it. All mutations go through the `PageStore`, keyed by the active
//! page; the session re-reads that page at every entry point and resets
//! its per-page state when the page has changed underneath it.
//!
//! History granularity for text: keystrokes go to the region's local
//! history; the global history sees one `UPDATE` per editing session,
//! committed on blur or before any other action touches the item.

use crate::cells::{
    ClipboardPayload, CellSelection, NavKey, NavOutcome, copy_block, navigate, parse_html_table, parse_tsv,
};
use crate::config::EditorConfig;
use crate::draw::{StrokeCapture, drawing_item, object_erase_hits, pixel_erase};
use crate::history::{GlobalHistory, HistoryStatus, SubscriptionId};
use crate::input::{InputEvent, Modifiers, PointerTarget};
use crate::local_history::{EditableRegion, HistoryKey, KeyRouting, LocalHistories, LocalHistory, RegionKey};
use crate::manipulate::{GestureKind, ManipulationSession};
use crate::media::{DecodeOutcome, ImportOutcome, ImportedFile, MediaController, MediaDevices, Notice, RecordingKind, UploadToken};
use crate::richtext::MarkupRegion;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use crate::tools::{EraserMode, ToolKind, ToolbarState, create_item};
use crate::viewport::Viewport;
use nc_core::geometry::{Point, ViewTransform};
use nc_core::id::ItemId;
use nc_core::model::{CanvasItem, ItemKind, ItemPatch, StickyColor};
use nc_core::store::{PageKey, PageStore};
use nc_core::table::{CellPos, CellRange, CellStyle, TableData};
use nc_render::hit::hit_test;
use nc_render::svg::render_page_svg;
use serde::Serialize;
use std::rc::Rc;

/// What the host should do with the event it just forwarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EventOutcome {
    /// Consumed; suppress the native default.
    Handled,
    /// Not relevant to the canvas.
    Ignored,
    /// Let the native behavior run (typing, caret moves, redo at the end
    /// of a local history).
    PassThrough,
    /// Put this on the system clipboard.
    Clipboard(ClipboardPayload),
}

/// The region being edited, mirrored from the host widget.
#[derive(Debug, Clone)]
struct EditSession {
    key: RegionKey,
    region: MarkupRegion,
    /// Item as of the last global commit for this session.
    before: CanvasItem,
}

#[derive(Debug, Clone)]
enum Gesture {
    Manipulate(ManipulationSession),
    Stroke { capture: StrokeCapture, erase: bool },
    ObjectErase,
}

pub struct CanvasSession<S: PageStore> {
    store: S,
    config: EditorConfig,
    viewport: Viewport,
    screen_size: (f64, f64),
    toolbar: ToolbarState,
    history: GlobalHistory,
    locals: LocalHistories,
    page: Option<PageKey>,
    selection: Option<ItemId>,
    editing: Option<EditSession>,
    gesture: Option<Gesture>,
    cells: CellSelection,
    media: MediaController,
    notices: Vec<Notice>,
}

impl<S: PageStore> CanvasSession<S> {
    pub fn new(store: S, config: EditorConfig) -> Self {
        let page = store.active_page().map(|p| p.key);
        Self {
            toolbar: ToolbarState::from_config(&config),
            locals: LocalHistories::new(config.local_history_capacity),
            store,
            config,
            viewport: Viewport::default(),
            screen_size: (0.0, 0.0),
            history: GlobalHistory::new(),
            page,
            selection: None,
            editing: None,
            gesture: None,
            cells: CellSelection::default(),
            media: MediaController::new(),
            notices: Vec::new(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable store access. A page switch made through it takes effect
    /// at the next session call.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewTransform {
        self.viewport.view()
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        self.viewport.set_view(view);
    }

    /// Visible canvas size in screen pixels; keyboard zoom centres on it.
    pub fn set_screen_size(&mut self, width: f64, height: f64) {
        if width.is_finite() && height.is_finite() {
            self.screen_size = (width.max(0.0), height.max(0.0));
        }
    }

    pub fn history(&self) -> &GlobalHistory {
        &self.history
    }

    pub fn local_history(&self, key: &RegionKey) -> Option<&LocalHistory> {
        self.locals.get(key)
    }

    pub fn selection(&self) -> Option<ItemId> {
        self.selection
    }

    pub fn editing(&self) -> Option<RegionKey> {
        self.editing.as_ref().map(|e| e.key)
    }

    /// Serialized content of the region being edited.
    pub fn editing_content(&self) -> Option<String> {
        self.editing.as_ref().map(|e| e.region.serialized_content())
    }

    pub fn editing_caret(&self) -> Option<usize> {
        self.editing.as_ref().map(|e| e.region.plain_offset())
    }

    pub fn cell_selection(&self) -> Option<(ItemId, CellRange)> {
        self.cells.range()
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Items of the active page, empty when no page is active.
    pub fn items(&self) -> Rc<Vec<CanvasItem>> {
        self.store
            .active_page()
            .map(|p| p.items)
            .unwrap_or_default()
    }

    pub fn item(&self, id: ItemId) -> Option<CanvasItem> {
        self.store.active_page()?.item(id).cloned()
    }

    pub fn toolbar(&self) -> ToolbarState {
        let mut bar = self.toolbar.clone().with_history(self.history.status());
        bar.recording = self.media.is_recording();
        bar
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.status()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(HistoryStatus) + 'static) -> SubscriptionId {
        self.history.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.history.unsubscribe(id)
    }

    /// Drain pending user notifications.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn render_svg(&self) -> String {
        let (width, height) = self.screen_size;
        render_page_svg(&self.items(), self.viewport.view(), width, height)
    }

    // ─── Page tracking ──────────────────────────────────────────────────

    /// Re-read the active page. On a change every per-page state is
    /// dropped: both histories, gestures, selection, the edit session, and
    /// pending media work.
    pub fn refresh_page(&mut self) -> Option<PageKey> {
        let current = self.store.active_page().map(|p| p.key);
        if current != self.page {
            log::debug!(
                "active page changed: {} -> {}",
                self.page.as_ref().map_or("none".to_string(), ToString::to_string),
                current.as_ref().map_or("none".to_string(), ToString::to_string),
            );
            self.history.clear();
            self.locals.clear();
            self.gesture = None;
            self.selection = None;
            self.editing = None;
            self.cells.clear();
            self.viewport.pinch_end();
            let dropped = self.media.abandon_all();
            if dropped > 0 {
                self.notices.push(Notice::Abandoned { count: dropped });
            }
            self.page = current.clone();
        }
        current
    }

    // ─── Input ──────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: InputEvent) -> EventOutcome {
        self.refresh_page();
        match event {
            InputEvent::PointerDown { x, y, target, .. } => self.pointer_down(Point::new(x, y), target),
            InputEvent::PointerMove { x, y, target } => self.pointer_move(Point::new(x, y), target),
            InputEvent::PointerUp { .. } => self.pointer_up(),
            InputEvent::Wheel {
                x,
                y,
                dx,
                dy,
                modifiers,
            } => {
                self.viewport
                    .wheel(Point::new(x, y), Point::new(dx, dy), modifiers, &self.config);
                EventOutcome::Handled
            }
            InputEvent::PinchStart { a, b } => {
                self.viewport.pinch_start(a, b);
                EventOutcome::Handled
            }
            InputEvent::PinchMove { a, b } => {
                self.viewport.pinch_move(a, b, &self.config);
                EventOutcome::Handled
            }
            InputEvent::PinchEnd => {
                self.viewport.pinch_end();
                EventOutcome::Handled
            }
            InputEvent::Key { key, modifiers } => self.key(&key, modifiers),
            InputEvent::Blur => {
                self.window_blur();
                EventOutcome::Handled
            }
        }
    }

    fn pointer_down(&mut self, screen: Point, target: PointerTarget) -> EventOutcome {
        if !screen.is_finite() || self.page.is_none() {
            return EventOutcome::Ignored;
        }
        let at = self.viewport.screen_to_canvas(screen);
        log::trace!("pointer down {screen:?} ({at:?}) on {target:?}");
        match self.toolbar.tool {
            ToolKind::Select => self.select_down(screen, at, target),
            tool @ (ToolKind::Text | ToolKind::Sticky | ToolKind::Table | ToolKind::Todo) => {
                self.create_at(tool, at)
            }
            ToolKind::Draw => {
                self.blur_editing();
                self.gesture = Some(Gesture::Stroke {
                    capture: StrokeCapture::begin(screen),
                    erase: false,
                });
                EventOutcome::Handled
            }
            ToolKind::Eraser => {
                self.blur_editing();
                match self.toolbar.eraser_mode {
                    EraserMode::Object => {
                        self.gesture = Some(Gesture::ObjectErase);
                        self.erase_at(at);
                    }
                    EraserMode::Pixel => {
                        self.gesture = Some(Gesture::Stroke {
                            capture: StrokeCapture::begin(screen),
                            erase: true,
                        });
                    }
                }
                EventOutcome::Handled
            }
        }
    }

    fn select_down(&mut self, screen: Point, at: Point, target: PointerTarget) -> EventOutcome {
        match target {
            PointerTarget::Handle { id } => self.begin_manipulation(GestureKind::Drag, id, screen),
            PointerTarget::ResizeHandle { id } => self.begin_manipulation(GestureKind::Resize, id, screen),
            PointerTarget::Editable { id } => {
                // Native text selection owns this pointer.
                self.select(id);
                EventOutcome::PassThrough
            }
            PointerTarget::Cell { id, row, col } => {
                self.select(id);
                self.cells.mouse_down(id, CellPos::new(row, col));
                EventOutcome::PassThrough
            }
            PointerTarget::Canvas => match hit_test(&self.items(), at) {
                Some(id) => self.begin_manipulation(GestureKind::Drag, id, screen),
                None => {
                    self.blur_editing();
                    self.selection = None;
                    self.cells.clear();
                    EventOutcome::Handled
                }
            },
        }
    }

    /// Select `id`, leaving any edit session on another item.
    fn select(&mut self, id: ItemId) {
        if self.editing.as_ref().is_some_and(|e| e.key.item != id) {
            self.blur_editing();
        }
        if self.cells.range().is_some_and(|(item, _)| item != id) {
            self.cells.clear();
        }
        self.selection = Some(id);
    }

    fn begin_manipulation(&mut self, kind: GestureKind, id: ItemId, screen: Point) -> EventOutcome {
        self.select(id);
        self.checkpoint_editing();
        let Some(item) = self.item(id) else {
            log::warn!("cannot {kind:?} missing item {id}");
            return EventOutcome::Ignored;
        };
        self.gesture = Some(Gesture::Manipulate(ManipulationSession::begin(kind, &item, screen)));
        EventOutcome::Handled
    }

    fn pointer_move(&mut self, screen: Point, target: PointerTarget) -> EventOutcome {
        if !screen.is_finite() {
            return EventOutcome::Ignored;
        }
        if self.cells.is_tracking() {
            if self.cells.mouse_move(target.cell()) {
                // Multi-cell mode: native selection inside the cell would fight it.
                self.blur_editing();
            }
            return EventOutcome::Handled;
        }
        if matches!(self.gesture, Some(Gesture::ObjectErase)) {
            let at = self.viewport.screen_to_canvas(screen);
            self.erase_at(at);
            return EventOutcome::Handled;
        }
        let live = match self.gesture.as_mut() {
            None | Some(Gesture::ObjectErase) => return EventOutcome::Ignored,
            Some(Gesture::Manipulate(session)) => session
                .update(screen, self.viewport.view(), &self.config)
                .map(|patch| (session.item_id(), patch)),
            Some(Gesture::Stroke { capture, .. }) => {
                capture.push(screen);
                return EventOutcome::Handled;
            }
        };
        if let Some((id, patch)) = live {
            self.update_live(id, &patch);
        }
        EventOutcome::Handled
    }

    fn pointer_up(&mut self) -> EventOutcome {
        if self.cells.is_tracking() {
            self.cells.mouse_up();
            return EventOutcome::Handled;
        }
        match self.gesture.take() {
            None => EventOutcome::Ignored,
            Some(Gesture::Manipulate(session)) => {
                self.finish_manipulation(session);
                EventOutcome::Handled
            }
            Some(Gesture::Stroke { capture, erase }) => {
                self.finish_stroke(capture, erase);
                EventOutcome::Handled
            }
            Some(Gesture::ObjectErase) => EventOutcome::Handled,
        }
    }

    fn finish_manipulation(&mut self, session: ManipulationSession) {
        let id = session.item_id();
        let Some(current) = self.item(id) else {
            log::warn!("{id} vanished during {:?}", session.kind());
            return;
        };
        let revert = session.revert_patch();
        let start_item = session.start_item().clone();
        match session.finish(&current, &self.config) {
            Some((prev, next)) => self.commit(prev, next),
            // A click: put back the sub-threshold wobble.
            None if current != start_item => {
                self.update_live(id, &revert);
            }
            None => {}
        }
    }

    fn finish_stroke(&mut self, capture: StrokeCapture, erase: bool) {
        let Some(stroke) = capture.finish(self.viewport.view(), self.config.drawing_padding) else {
            return;
        };
        if !erase {
            let item = drawing_item(&stroke, &self.toolbar.draw_color, self.toolbar.stroke_width);
            self.add_item(item);
            return;
        }
        let updates = pixel_erase(&self.items(), &stroke, self.toolbar.mask_width());
        log::debug!("pixel erase touches {} drawing(s)", updates.len());
        for (prev, next) in updates {
            if let Some(stored) = self.update_live(next.id, &ItemPatch::replace(&next)) {
                self.commit(prev, stored);
            }
        }
    }

    /// Window lost focus: every in-flight gesture is dropped, and a drag
    /// or resize snaps back to where it started without a history entry.
    fn window_blur(&mut self) {
        self.cells.mouse_up();
        self.viewport.pinch_end();
        if let Some(Gesture::Manipulate(session)) = self.gesture.take() {
            log::debug!("window blur cancels {:?} of {}", session.kind(), session.item_id());
            self.update_live(session.item_id(), &session.revert_patch());
        }
    }

    fn key(&mut self, key: &str, modifiers: Modifiers) -> EventOutcome {
        if self.editing.is_some() {
            return self.key_in_region(key, modifiers);
        }
        let action = ShortcutMap::resolve(key, modifiers);
        if self.cells.range().is_some() {
            match action {
                Some(ShortcutAction::Copy) => {
                    return self.copy_cells().map_or(EventOutcome::Ignored, EventOutcome::Clipboard);
                }
                Some(ShortcutAction::Cut) => {
                    return self.cut_cells().map_or(EventOutcome::Ignored, EventOutcome::Clipboard);
                }
                Some(ShortcutAction::Delete) => {
                    self.delete_cells();
                    return EventOutcome::Handled;
                }
                _ => {}
            }
        }
        let Some(action) = action else {
            return EventOutcome::Ignored;
        };
        match action {
            ShortcutAction::Undo => {
                self.undo();
            }
            ShortcutAction::Redo => {
                self.redo();
            }
            ShortcutAction::Delete => {
                if !self.delete_selected() {
                    return EventOutcome::Ignored;
                }
            }
            ShortcutAction::Deselect => {
                self.selection = None;
                self.cells.clear();
            }
            ShortcutAction::Tool(tool) => self.set_tool(tool),
            ShortcutAction::ZoomIn | ShortcutAction::ZoomOut => {
                let center = Point::new(self.screen_size.0 / 2.0, self.screen_size.1 / 2.0);
                let zoom_in = action == ShortcutAction::ZoomIn;
                self.viewport.zoom_step(center, zoom_in, &self.config);
            }
            ShortcutAction::ZoomReset => self.viewport.reset_zoom(),
            // The host reads the clipboard and calls `paste`.
            ShortcutAction::Copy | ShortcutAction::Cut | ShortcutAction::Paste => {
                return EventOutcome::PassThrough;
            }
        }
        EventOutcome::Handled
    }

    fn key_in_region(&mut self, key: &str, modifiers: Modifiers) -> EventOutcome {
        if let Some(history_key) = ShortcutMap::history_key(key, modifiers) {
            return self.route_history_key(history_key);
        }
        if key == "Escape" {
            self.blur_editing();
            return EventOutcome::Handled;
        }
        let in_cell = self.editing.as_ref().is_some_and(|e| e.key.cell.is_some());
        if in_cell {
            if let Some(nav) = NavKey::from_key(key, modifiers) {
                return self.navigate_cell(nav);
            }
        }
        EventOutcome::PassThrough
    }

    fn route_history_key(&mut self, key: HistoryKey) -> EventOutcome {
        let Some(edit) = self.editing.as_mut() else {
            return EventOutcome::Ignored;
        };
        let routing = match self.locals.get_mut(&edit.key) {
            Some(history) => {
                let routing = history.route(key, &mut edit.region);
                if matches!(routing, KeyRouting::Restored { .. }) {
                    // The restore's own change notification; adopted, not pushed.
                    history.record(&edit.region);
                }
                routing
            }
            None => KeyRouting::BubbleToGlobal,
        };
        let region_key = edit.key;
        match routing {
            KeyRouting::Restored { content } => {
                self.write_region(region_key, &content);
                EventOutcome::Handled
            }
            KeyRouting::BubbleToGlobal => {
                match key {
                    HistoryKey::Undo => self.undo(),
                    HistoryKey::Redo => self.redo(),
                };
                EventOutcome::Handled
            }
            KeyRouting::PassThrough => EventOutcome::PassThrough,
        }
    }

    fn navigate_cell(&mut self, nav: NavKey) -> EventOutcome {
        let Some(edit) = self.editing.as_ref() else {
            return EventOutcome::Ignored;
        };
        let Some(from) = edit.key.cell else {
            return EventOutcome::Ignored;
        };
        let id = edit.key.item;
        let (at_start, at_end) = (edit.region.caret_at_start(), edit.region.caret_at_end());
        let Some((rows, cols)) = self.item(id).and_then(|i| i.as_table().map(|t| (t.rows, t.cols))) else {
            return EventOutcome::Ignored;
        };
        match navigate(rows, cols, from, nav, at_start, at_end) {
            NavOutcome::Focus(to) => {
                self.focus_cell(id, to);
                EventOutcome::Handled
            }
            NavOutcome::AppendRow(to) => {
                self.add_table_row(id, rows);
                self.focus_cell(id, to);
                EventOutcome::Handled
            }
            NavOutcome::Stay => EventOutcome::PassThrough,
        }
    }

    // ─── Global history ─────────────────────────────────────────────────

    /// Undo the last global action. Pending text edits are committed
    /// first so they are what gets undone.
    pub fn undo(&mut self) -> bool {
        self.refresh_page();
        self.checkpoint_editing();
        match self.history.undo(&mut self.store) {
            Some(id) => {
                self.after_global_step(id);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.refresh_page();
        self.checkpoint_editing();
        match self.history.redo(&mut self.store) {
            Some(id) => {
                self.after_global_step(id);
                true
            }
            None => false,
        }
    }

    /// A global step rewrote `id` wholesale; its local histories no longer
    /// describe it.
    fn after_global_step(&mut self, id: ItemId) {
        self.gesture = None;
        self.locals.forget_item(id);
        let exists = self.item(id).is_some();
        if !exists {
            if self.selection == Some(id) {
                self.selection = None;
            }
            if self.cells.range().is_some_and(|(item, _)| item == id) {
                self.cells.clear();
            }
        }
        self.reload_editing(id);
    }

    /// Re-seed the edit session on `id` from the store.
    fn reload_editing(&mut self, id: ItemId) {
        let Some(key) = self.editing.as_ref().map(|e| e.key) else {
            return;
        };
        if key.item != id {
            return;
        }
        let reloaded = self
            .item(id)
            .and_then(|item| region_content(&item, key.cell).map(|content| (item, content)));
        match reloaded {
            Some((before, content)) => {
                let region = MarkupRegion::new(&content);
                self.locals.focus(key, &region);
                self.editing = Some(EditSession { key, region, before });
            }
            None => self.editing = None,
        }
    }

    /// Record `prev → next` unless nothing changed.
    fn commit(&mut self, prev: CanvasItem, next: CanvasItem) {
        if prev == next {
            return;
        }
        if let Some(edit) = self.editing.as_mut() {
            if edit.key.item == next.id {
                edit.before = next.clone();
            }
        }
        self.history.record_update(prev, next);
    }

    /// Commit the open edit session's changes as one `UPDATE`, keeping
    /// the session open.
    fn checkpoint_editing(&mut self) {
        let Some(id) = self.editing.as_ref().map(|e| e.key.item) else {
            return;
        };
        let Some(current) = self.item(id) else {
            return;
        };
        if let Some(edit) = self.editing.as_mut() {
            if edit.before != current {
                let prev = std::mem::replace(&mut edit.before, current.clone());
                self.history.record_update(prev, current);
            }
        }
    }

    // ─── Store helpers ──────────────────────────────────────────────────

    /// Write to the store without recording history.
    fn update_live(&mut self, id: ItemId, patch: &ItemPatch) -> Option<CanvasItem> {
        let key = self.page.clone()?;
        match self.store.update_canvas_item(&key, id, patch) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("update of {id} dropped: {e}");
                None
            }
        }
    }

    fn add_item(&mut self, item: CanvasItem) -> bool {
        let Some(key) = self.page.clone() else {
            return false;
        };
        match self.store.add_canvas_item(&key, item.clone()) {
            Ok(()) => {
                self.history.record_add(item);
                true
            }
            Err(e) => {
                log::warn!("cannot add {}: {e}", item.id);
                false
            }
        }
    }

    /// Delete `id` and record `DELETE`.
    pub fn delete_item(&mut self, id: ItemId) -> bool {
        let Some(key) = self.refresh_page() else {
            return false;
        };
        self.checkpoint_editing();
        if self.editing.as_ref().is_some_and(|e| e.key.item == id) {
            self.editing = None;
        }
        match self.store.delete_canvas_item(&key, id) {
            Ok(item) => {
                self.history.record_delete(item);
                self.locals.forget_item(id);
                if self.selection == Some(id) {
                    self.selection = None;
                }
                if self.cells.range().is_some_and(|(item, _)| item == id) {
                    self.cells.clear();
                }
                true
            }
            Err(e) => {
                log::warn!("cannot delete {id}: {e}");
                false
            }
        }
    }

    /// Apply `edit` to a copy of the item and record one `UPDATE`.
    /// `edit` returns `false` to abort without touching anything.
    fn edit_item(&mut self, id: ItemId, edit: impl FnOnce(&mut CanvasItem) -> bool) -> Option<CanvasItem> {
        self.refresh_page()?;
        self.checkpoint_editing();
        let prev = self.item(id)?;
        let mut next = prev.clone();
        if !edit(&mut next) {
            return None;
        }
        let stored = self.update_live(id, &ItemPatch::replace(&next))?;
        self.commit(prev, stored.clone());
        Some(stored)
    }

    fn edit_table(&mut self, id: ItemId, edit: impl FnOnce(&mut TableData) -> bool) -> bool {
        self.edit_item(id, |item| item.as_table_mut().is_some_and(edit))
            .is_some()
    }

    // ─── Tools & toolbar ────────────────────────────────────────────────

    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != ToolKind::Select {
            self.blur_editing();
            self.selection = None;
            self.cells.clear();
        }
        self.gesture = None;
        log::debug!("tool {:?} -> {tool:?}", self.toolbar.tool);
        self.toolbar.tool = tool;
    }

    pub fn set_draw_color(&mut self, color: &str) {
        self.toolbar.draw_color = color.to_string();
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.toolbar.set_stroke_width(width);
    }

    pub fn set_eraser_mode(&mut self, mode: EraserMode) {
        self.toolbar.eraser_mode = mode;
    }

    pub fn set_eraser_radius(&mut self, radius: f64) {
        self.toolbar.set_eraser_radius(radius);
    }

    fn create_at(&mut self, tool: ToolKind, at: Point) -> EventOutcome {
        let Some(item) = create_item(tool, at, &self.config) else {
            return EventOutcome::Ignored;
        };
        self.blur_editing();
        let id = item.id;
        if !self.add_item(item) {
            return EventOutcome::Ignored;
        }
        self.selection = Some(id);
        self.toolbar.tool = ToolKind::Select;
        if matches!(tool, ToolKind::Text | ToolKind::Sticky) {
            self.focus_text(id);
        }
        EventOutcome::Handled
    }

    fn erase_at(&mut self, at: Point) {
        let hits = object_erase_hits(
            &self.items(),
            at,
            self.toolbar.eraser_radius,
            self.config.mask_safety_margin,
        );
        for id in hits {
            log::debug!("object erase {id}");
            self.delete_item(id);
        }
    }

    /// Delete every drawing on the page, one `DELETE` each. Returns the
    /// number removed.
    pub fn clear_drawings(&mut self) -> usize {
        let ids: Vec<ItemId> = self
            .items()
            .iter()
            .filter(|i| i.as_drawing().is_some())
            .map(|i| i.id)
            .collect();
        ids.into_iter().filter(|id| self.delete_item(*id)).count()
    }

    /// Delete the selected item, unless it is being edited.
    pub fn delete_selected(&mut self) -> bool {
        match self.selection {
            Some(id) if self.editing.is_none() => self.delete_item(id),
            _ => false,
        }
    }

    // ─── Text editing ───────────────────────────────────────────────────

    /// Focus the body of a text or sticky item.
    pub fn focus_text(&mut self, id: ItemId) -> bool {
        self.focus_region(RegionKey::body(id))
    }

    /// Focus one table cell.
    pub fn focus_cell(&mut self, id: ItemId, pos: CellPos) -> bool {
        self.focus_region(RegionKey::cell(id, pos))
    }

    fn focus_region(&mut self, key: RegionKey) -> bool {
        if self.refresh_page().is_none() {
            return false;
        }
        if self.editing.as_ref().is_some_and(|e| e.key == key) {
            return true;
        }
        self.blur_editing();
        let Some(item) = self.item(key.item) else {
            return false;
        };
        let Some(content) = region_content(&item, key.cell) else {
            log::warn!("{} has no editable region {:?}", key.item, key.cell);
            return false;
        };
        let region = MarkupRegion::new(&content);
        self.locals.focus(key, &region);
        self.selection = Some(key.item);
        self.editing = Some(EditSession {
            key,
            region,
            before: item,
        });
        true
    }

    /// The host widget's content changed. `caret` is a plain-text offset.
    pub fn region_input(&mut self, content: &str, caret: usize) -> bool {
        self.refresh_page();
        let Some(edit) = self.editing.as_mut() else {
            log::warn!("input with no region focused");
            return false;
        };
        edit.region.set_serialized_content(content);
        edit.region.set_plain_offset(caret);
        self.region_changed()
    }

    /// Type `text` at the caret of the focused region.
    pub fn type_text(&mut self, text: &str) -> bool {
        self.refresh_page();
        let Some(edit) = self.editing.as_mut() else {
            return false;
        };
        edit.region.insert_text(text);
        self.region_changed()
    }

    pub fn set_caret(&mut self, offset: usize) {
        if let Some(edit) = self.editing.as_mut() {
            edit.region.set_plain_offset(offset);
        }
    }

    fn region_changed(&mut self) -> bool {
        let Some(edit) = self.editing.as_ref() else {
            return false;
        };
        let key = edit.key;
        let content = edit.region.serialized_content();
        if let Some(history) = self.locals.get_mut(&key) {
            history.record(&edit.region);
        }
        self.write_region(key, &content).is_some()
    }

    fn write_region(&mut self, key: RegionKey, content: &str) -> Option<CanvasItem> {
        let item = self.item(key.item)?;
        let kind = with_region_content(&item, key.cell, content)?;
        self.update_live(key.item, &ItemPatch::content(kind))
    }

    /// Leave the focused region, committing its edits. A text box left
    /// blank deletes itself.
    pub fn blur_editing(&mut self) {
        let Some(edit) = self.editing.as_ref() else {
            return;
        };
        let key = edit.key;
        let blank_text = key.cell.is_none()
            && edit.region.is_blank()
            && self
                .item(key.item)
                .is_some_and(|i| matches!(i.kind, ItemKind::Text(_)));
        self.checkpoint_editing();
        if blank_text {
            log::debug!("empty text box {} removes itself", key.item);
            self.delete_item(key.item);
        }
        self.editing = None;
    }

    /// Paste into the focused region, or into the selected cells.
    ///
    /// An HTML table pasted into a table overwrites the block at the
    /// target cell (one `UPDATE`) and resets those cells' local
    /// histories. Anything else is inserted as plain text at the caret.
    pub fn paste(&mut self, html: Option<&str>, plain: &str) -> bool {
        self.refresh_page();
        let block = html.and_then(parse_html_table);
        let target = match (&self.editing, self.cells.range()) {
            (Some(edit), _) => edit.key.cell.map(|pos| (edit.key.item, pos)),
            (None, Some((id, range))) => Some((id, range.top_left())),
            (None, None) => None,
        };
        if let Some((id, at)) = target {
            let block = block.or_else(|| (self.editing.is_none()).then(|| parse_tsv(plain)));
            if let Some(block) = block.filter(|b| !b.is_empty()) {
                return self.paste_block(id, at, &block);
            }
        }
        if self.editing.is_none() {
            return false;
        }
        self.type_text(plain)
    }

    fn paste_block(&mut self, id: ItemId, at: CellPos, block: &[Vec<String>]) -> bool {
        let mut touched = Vec::new();
        let pasted = self.edit_table(id, |table| {
            touched = table.paste_block(at, block);
            !touched.is_empty()
        });
        if pasted {
            log::debug!("pasted {} cell(s) into {id}", touched.len());
            self.locals.reset_cells(id, &touched);
            self.refresh_region_text(id);
        }
        pasted
    }

    /// Pull the focused region's content from the store after another
    /// path rewrote it. The local history is left as is.
    fn refresh_region_text(&mut self, id: ItemId) {
        let Some(key) = self.editing.as_ref().map(|e| e.key) else {
            return;
        };
        if key.item != id {
            return;
        }
        let Some(content) = self.item(id).and_then(|i| region_content(&i, key.cell)) else {
            return;
        };
        if let Some(edit) = self.editing.as_mut() {
            let caret = edit.region.plain_offset();
            edit.region = MarkupRegion::new(&content);
            edit.region.set_plain_offset(caret);
        }
    }

    // ─── Table cells ────────────────────────────────────────────────────

    pub fn copy_cells(&self) -> Option<ClipboardPayload> {
        let (id, range) = self.cells.range()?;
        let item = self.item(id)?;
        let table = item.as_table()?;
        Some(copy_block(table, table.clamp_range(range)))
    }

    pub fn cut_cells(&mut self) -> Option<ClipboardPayload> {
        let payload = self.copy_cells()?;
        self.delete_cells();
        Some(payload)
    }

    /// Clear the selected cells with one `UPDATE`.
    pub fn delete_cells(&mut self) -> bool {
        let Some((id, range)) = self.cells.range() else {
            return false;
        };
        let mut cleared = Vec::new();
        let changed = self.edit_table(id, |table| {
            cleared = table.clear_range(table.clamp_range(range));
            !cleared.is_empty()
        });
        if changed {
            self.locals.reset_cells(id, &cleared);
            self.refresh_region_text(id);
        }
        changed
    }

    pub fn add_table_row(&mut self, id: ItemId, at: usize) -> bool {
        self.reshape_table(id, |table| {
            table.add_row(at);
            true
        })
    }

    pub fn delete_table_row(&mut self, id: ItemId, at: usize) -> bool {
        self.reshape_table(id, |table| table.delete_row(at))
    }

    pub fn add_table_column(&mut self, id: ItemId, at: usize) -> bool {
        self.reshape_table(id, |table| {
            table.add_column(at);
            true
        })
    }

    pub fn delete_table_column(&mut self, id: ItemId, at: usize) -> bool {
        self.reshape_table(id, |table| table.delete_column(at))
    }

    /// Row/column edits shift cell positions, so every cell history of
    /// the table is dropped and a cell edit session is closed.
    fn reshape_table(&mut self, id: ItemId, edit: impl FnOnce(&mut TableData) -> bool) -> bool {
        if self
            .editing
            .as_ref()
            .is_some_and(|e| e.key.item == id && e.key.cell.is_some())
        {
            self.blur_editing();
        }
        let changed = self.edit_table(id, edit);
        if changed {
            self.locals.forget_item(id);
            if self.cells.range().is_some_and(|(item, _)| item == id) {
                self.cells.clear();
            }
        }
        changed
    }

    pub fn set_cell_style(&mut self, id: ItemId, pos: CellPos, style: CellStyle) -> bool {
        self.edit_table(id, |table| table.set_cell_style(pos, style))
    }

    // ─── Other item edits ───────────────────────────────────────────────

    pub fn set_sticky_color(&mut self, id: ItemId, color: &str) -> bool {
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Sticky(sticky) => {
                sticky.color = StickyColor::from(color.to_string());
                true
            }
            _ => false,
        })
        .is_some()
    }

    pub fn set_todo_title(&mut self, id: ItemId, title: &str) -> bool {
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Todo(todo) if todo.title != title => {
                todo.title = title.to_string();
                true
            }
            _ => false,
        })
        .is_some()
    }

    /// Returns the new entry's id.
    pub fn add_todo_entry(&mut self, id: ItemId, text: &str) -> Option<String> {
        let mut entry = None;
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Todo(todo) => {
                entry = Some(todo.add_entry(text));
                true
            }
            _ => false,
        })?;
        entry
    }

    pub fn toggle_todo_entry(&mut self, id: ItemId, entry: &str) -> bool {
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Todo(todo) => todo.toggle_entry(entry),
            _ => false,
        })
        .is_some()
    }

    pub fn set_todo_entry_text(&mut self, id: ItemId, entry: &str, text: &str) -> bool {
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Todo(todo) => todo.set_entry_text(entry, text),
            _ => false,
        })
        .is_some()
    }

    pub fn remove_todo_entry(&mut self, id: ItemId, entry: &str) -> bool {
        self.edit_item(id, |item| match &mut item.kind {
            ItemKind::Todo(todo) => todo.remove_entry(entry),
            _ => false,
        })
        .is_some()
    }

    pub fn add_tag(&mut self, id: ItemId, tag: &str) -> bool {
        self.tag_op(id, |store, key| store.add_tag_to_item(key, id, tag))
    }

    pub fn remove_tag(&mut self, id: ItemId, tag: &str) -> bool {
        self.tag_op(id, |store, key| store.remove_tag_from_item(key, id, tag))
    }

    fn tag_op(
        &mut self,
        id: ItemId,
        op: impl FnOnce(&mut S, &PageKey) -> nc_core::CanvasResult<bool>,
    ) -> bool {
        let Some(key) = self.refresh_page() else {
            return false;
        };
        self.checkpoint_editing();
        let Some(prev) = self.item(id) else {
            return false;
        };
        match op(&mut self.store, &key) {
            Ok(true) => {
                if let Some(next) = self.item(id) {
                    self.commit(prev, next);
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("tag change on {id} rejected: {e}");
                false
            }
        }
    }

    // ─── Media ──────────────────────────────────────────────────────────

    /// Import a file dropped at screen point `at`. Returns a token when
    /// the host must decode an image and report back via `image_decoded`.
    pub fn import_file(&mut self, file: ImportedFile, at: Point) -> Option<UploadToken> {
        let Some(key) = self.refresh_page() else {
            self.notices.push(Notice::ImportFailed {
                file_name: file.name,
                reason: "no page is open".to_string(),
            });
            return None;
        };
        let at = self.viewport.screen_to_canvas(at);
        match self.media.import(file, at, &key, &self.config) {
            ImportOutcome::Placed(item) => {
                self.add_item(item);
                None
            }
            ImportOutcome::AwaitingDecode(token) => Some(token),
        }
    }

    pub fn image_decoded(&mut self, token: UploadToken, natural_width: f64, natural_height: f64) -> Option<ItemId> {
        self.refresh_page();
        match self
            .media
            .image_decoded(token, natural_width, natural_height, &self.config)
        {
            DecodeOutcome::Placed(item) => {
                let id = item.id;
                self.add_item(item).then_some(id)
            }
            DecodeOutcome::Failed(notice) => {
                self.notices.push(notice);
                None
            }
            DecodeOutcome::Stale => {
                log::debug!("decode result for abandoned upload {token:?}");
                None
            }
        }
    }

    pub fn upload_failed(&mut self, token: UploadToken, reason: &str) {
        self.refresh_page();
        if let Some(notice) = self.media.upload_failed(token, reason) {
            self.notices.push(notice);
        }
    }

    /// Ask for device access and start recording. A denial leaves the
    /// session idle and queues a notice.
    pub fn start_recording(&mut self, devices: &mut dyn MediaDevices, kind: RecordingKind, at: Point) -> bool {
        let Some(key) = self.refresh_page() else {
            return false;
        };
        let at = self.viewport.screen_to_canvas(at);
        match self.media.start_recording(devices, kind, &key, at) {
            Ok(()) => self.media.is_recording(),
            Err(notice) => {
                self.notices.push(notice);
                false
            }
        }
    }

    /// Stop recording and place the clip. Records `ADD`.
    pub fn stop_recording(&mut self, data_url: &str) -> Option<ItemId> {
        let current = self.refresh_page();
        let (page, item) = self.media.stop_recording(data_url, &self.config)?;
        if current.as_ref() != Some(&page) {
            log::warn!("recording for {page} finished on another page; dropped");
            return None;
        }
        let id = item.id;
        self.add_item(item).then_some(id)
    }
}

/// Content of the region `cell` (or the body) of `item`.
fn region_content(item: &CanvasItem, cell: Option<CellPos>) -> Option<String> {
    match (&item.kind, cell) {
        (ItemKind::Text(text), None) => Some(text.content.clone()),
        (ItemKind::Sticky(sticky), None) => Some(sticky.content.clone()),
        (ItemKind::Table(table), Some(pos)) => table.cell(pos).map(str::to_string),
        _ => None,
    }
}

fn with_region_content(item: &CanvasItem, cell: Option<CellPos>, content: &str) -> Option<ItemKind> {
    let mut kind = item.kind.clone();
    match (&mut kind, cell) {
        (ItemKind::Text(text), None) => text.content = content.to_string(),
        (ItemKind::Sticky(sticky), None) => sticky.content = content.to_string(),
        (ItemKind::Table(table), Some(pos)) => {
            if !table.set_cell(pos, content) {
                return None;
            }
        }
        _ => return None,
    }
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryAction;
    use nc_core::geometry::Bounds;
    use nc_core::model::{DrawingData, StickyData, TextData};
    use nc_core::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn key() -> PageKey {
        PageKey::new("nb", "sec", "page")
    }

    fn session() -> CanvasSession<MemoryStore> {
        CanvasSession::new(MemoryStore::with_single_page(key()), EditorConfig::default())
    }

    fn put(session: &mut CanvasSession<MemoryStore>, item: CanvasItem) -> ItemId {
        let id = item.id;
        session.store_mut().add_canvas_item(&key(), item).unwrap();
        id
    }

    fn sticky(id: &str) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern(id),
            Bounds::new(100.0, 100.0, 200.0, 200.0),
            ItemKind::Sticky(StickyData::default()),
        )
    }

    #[test]
    fn sub_threshold_drag_is_a_click() {
        let mut s = session();
        let id = put(&mut s, sticky("cs_click"));
        s.handle_event(InputEvent::pointer_down(110.0, 110.0, PointerTarget::Handle { id }));
        s.handle_event(InputEvent::pointer_move(110.5, 110.0));
        s.handle_event(InputEvent::pointer_up(110.5, 110.0));
        assert_eq!(s.history().undo_depth(), 0);
        assert_eq!(s.item(id).unwrap().x, 100.0);
        assert_eq!(s.selection(), Some(id));
    }

    #[test]
    fn blur_reverts_drag_without_history() {
        let mut s = session();
        let id = put(&mut s, sticky("cs_blur"));
        s.handle_event(InputEvent::pointer_down(110.0, 110.0, PointerTarget::Handle { id }));
        s.handle_event(InputEvent::pointer_move(200.0, 200.0));
        assert_eq!(s.item(id).unwrap().x, 190.0);
        s.handle_event(InputEvent::Blur);
        assert_eq!(s.item(id).unwrap().x, 100.0);
        assert!(!s.is_gesture_active());
        assert!(!s.history().can_undo());
    }

    #[test]
    fn creation_tool_places_item_and_returns_to_select() {
        let mut s = session();
        s.set_tool(ToolKind::Todo);
        s.handle_event(InputEvent::pointer_down(40.0, 50.0, PointerTarget::Canvas));
        let items = s.items();
        assert_eq!(items.len(), 1);
        assert_eq!((items[0].x, items[0].y), (40.0, 50.0));
        assert_eq!(s.toolbar().tool, ToolKind::Select);
        assert_eq!(s.selection(), Some(items[0].id));
        assert!(matches!(s.history().last(), Some(HistoryAction::Add { .. })));
    }

    #[test]
    fn blank_text_box_deletes_itself_on_blur() {
        let mut s = session();
        s.set_tool(ToolKind::Text);
        s.handle_event(InputEvent::pointer_down(0.0, 0.0, PointerTarget::Canvas));
        let id = s.selection().unwrap();
        assert_eq!(s.editing(), Some(RegionKey::body(id)));
        s.blur_editing();
        assert!(s.items().is_empty());
        assert!(matches!(s.history().last(), Some(HistoryAction::Delete { .. })));
    }

    #[test]
    fn delete_key_removes_selection() {
        let mut s = session();
        let id = put(&mut s, sticky("cs_del"));
        s.handle_event(InputEvent::pointer_down(150.0, 150.0, PointerTarget::Canvas));
        s.handle_event(InputEvent::pointer_up(150.0, 150.0));
        assert_eq!(s.selection(), Some(id));
        assert_eq!(s.handle_event(InputEvent::key("Delete", Modifiers::NONE)), EventOutcome::Handled);
        assert!(s.items().is_empty());
        assert!(s.undo());
        assert_eq!(s.item(id), Some(sticky("cs_del")));
    }

    #[test]
    fn typing_in_tool_created_sticky_coalesces() {
        let mut s = session();
        s.set_tool(ToolKind::Sticky);
        s.handle_event(InputEvent::pointer_down(0.0, 0.0, PointerTarget::Canvas));
        let id = s.selection().unwrap();
        s.type_text("h");
        s.type_text("i");
        s.blur_editing();
        assert_eq!(s.history().undo_depth(), 1);
        match s.history().last() {
            Some(HistoryAction::Add { item }) => match &item.kind {
                ItemKind::Sticky(data) => assert_eq!(data.content, "hi"),
                other => panic!("expected sticky, got {other:?}"),
            },
            other => panic!("expected ADD, got {other:?}"),
        }
        s.undo();
        assert!(s.item(id).is_none());
    }

    #[test]
    fn local_undo_does_not_touch_global_history() {
        let mut s = session();
        let id = put(
            &mut s,
            CanvasItem::new(
                ItemId::intern("cs_local"),
                Bounds::new(0.0, 0.0, 200.0, 60.0),
                ItemKind::Text(TextData {
                    content: "a".into(),
                    ..TextData::default()
                }),
            ),
        );
        s.focus_text(id);
        s.type_text("b");
        s.type_text("c");
        let undo = InputEvent::key("z", Modifiers::cmd());
        assert_eq!(s.handle_event(undo.clone()), EventOutcome::Handled);
        assert_eq!(s.editing_content().as_deref(), Some("ab"));
        assert_eq!(s.item(id).unwrap().as_text().unwrap().content, "ab");
        assert!(!s.history().can_undo());

        s.handle_event(undo.clone());
        // At index 0 the next undo bubbles; nothing global to undo yet.
        assert_eq!(s.handle_event(undo), EventOutcome::Handled);
        assert_eq!(s.item(id).unwrap().as_text().unwrap().content, "a");
        assert!(!s.history().can_undo());
    }

    #[test]
    fn object_eraser_skips_masked_drawings() {
        let mut s = session();
        let id = put(
            &mut s,
            CanvasItem::new(
                ItemId::intern("cs_masked"),
                Bounds::new(0.0, 0.0, 110.0, 20.0),
                ItemKind::Drawing(DrawingData {
                    paths: "M 0 5 L 100 5".into(),
                    color: "#000".into(),
                    stroke_width: 2.0,
                    mask_paths: vec![nc_core::model::MaskPath {
                        path: "M 40 5 L 60 5".into(),
                        stroke_width: 20.0,
                    }],
                }),
            ),
        );
        s.set_tool(ToolKind::Eraser);
        s.handle_event(InputEvent::pointer_down(50.0, 5.0, PointerTarget::Canvas));
        s.handle_event(InputEvent::pointer_up(50.0, 5.0));
        assert!(s.item(id).is_some());
        assert!(!s.history().can_undo());
    }

    #[test]
    fn clear_drawings_records_one_delete_each() {
        let mut s = session();
        for n in 0..3 {
            let drawing = CanvasItem::new(
                ItemId::intern(&format!("cs_clear_{n}")),
                Bounds::new(0.0, 0.0, 20.0, 20.0),
                ItemKind::Drawing(DrawingData {
                    paths: "M 0 0 L 10 10".into(),
                    color: "#000".into(),
                    stroke_width: 2.0,
                    mask_paths: Vec::new(),
                }),
            );
            put(&mut s, drawing);
        }
        put(&mut s, sticky("cs_clear_keep"));
        assert_eq!(s.clear_drawings(), 3);
        assert_eq!(s.items().len(), 1);
        assert_eq!(s.history().undo_depth(), 3);
    }

    #[test]
    fn tag_edits_are_undoable() {
        let mut s = session();
        let id = put(
            &mut s,
            CanvasItem::new(
                ItemId::intern("cs_tag"),
                Bounds::new(0.0, 0.0, 200.0, 60.0),
                ItemKind::Text(TextData {
                    content: "x".into(),
                    ..TextData::default()
                }),
            ),
        );
        assert!(s.add_tag(id, "work"));
        assert!(!s.add_tag(id, "work"));
        assert_eq!(s.item(id).unwrap().as_text().unwrap().tags.as_slice(), ["work"]);
        s.undo();
        assert!(s.item(id).unwrap().as_text().unwrap().tags.is_empty());
    }

    #[test]
    fn keyboard_zoom_centres_on_screen() {
        let mut s = session();
        s.set_screen_size(800.0, 600.0);
        let center = Point::new(400.0, 300.0);
        let before = s.view().screen_to_canvas(center);
        s.handle_event(InputEvent::key("=", Modifiers::cmd()));
        assert!(s.view().scale() > 1.0);
        let after = s.view().screen_to_canvas(center);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
    }
}
