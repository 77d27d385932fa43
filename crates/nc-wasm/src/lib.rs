//! WASM bridge for NC: exposes the canvas session to the browser host.
//!
//! Compiled via `wasm-pack build --target web`. Structured values cross
//! the boundary as JSON strings; ids are plain strings.

use js_sys::Function;
use nc_core::geometry::{Point, ViewTransform};
use nc_core::id::ItemId;
use nc_core::model::CanvasItem;
use nc_core::store::{MemoryStore, PageKey};
use nc_core::table::CellPos;
use nc_editor::history::SubscriptionId;
use nc_editor::media::{ImportedFile, MediaDevices, RecordingKind, UploadToken};
use nc_editor::{CanvasSession, EditorConfig, EraserMode, EventOutcome, InputEvent, Modifiers, ToolKind};
use wasm_bindgen::prelude::*;

/// The browser-facing canvas controller.
///
/// Owns a `CanvasSession` over an in-memory store. The host loads the
/// page it shows with `open_page` and saves `items_json` back.
#[wasm_bindgen]
pub struct NoteCanvas {
    session: CanvasSession<MemoryStore>,
    history_listener: Option<SubscriptionId>,
}

/// Permission result the host already obtained from `getUserMedia`.
struct HostGrant(Result<(), String>);

impl MediaDevices for HostGrant {
    fn request_access(&mut self, _kind: RecordingKind) -> Result<(), String> {
        self.0.clone()
    }
}

#[wasm_bindgen]
impl NoteCanvas {
    /// Create a controller. `config_json` is an optional partial
    /// `EditorConfig`; invalid JSON falls back to the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(width: f64, height: f64, config_json: Option<String>) -> Self {
        console_error_panic_hook_setup();

        let config = match config_json.as_deref().map(EditorConfig::from_json) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                log::warn!("ignoring editor config: {e}");
                EditorConfig::default()
            }
            None => EditorConfig::default(),
        };
        let mut session = CanvasSession::new(MemoryStore::new(), config);
        session.set_screen_size(width, height);
        Self {
            session,
            history_listener: None,
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.session.set_screen_size(width, height);
    }

    // ─── Pages ───────────────────────────────────────────────────────────

    /// Load `items_json` (`CanvasItem[]`) into a page and make it active.
    /// Returns `false` if the JSON is invalid; the active page is unchanged.
    pub fn open_page(&mut self, notebook_id: &str, section_id: &str, page_id: &str, items_json: &str) -> bool {
        let key = PageKey::new(notebook_id, section_id, page_id);
        let store = self.session.store_mut();
        if let Err(e) = store.load_items_json(&key, items_json) {
            log::warn!("cannot open {key}: {e}");
            return false;
        }
        // Reloading the shown page still starts a fresh session.
        self.close_page();
        let opened = self.session.store_mut().set_active(Some(key)).is_ok();
        self.session.refresh_page();
        opened
    }

    pub fn close_page(&mut self) {
        if let Err(e) = self.session.store_mut().set_active(None) {
            log::warn!("cannot close page: {e}");
        }
        self.session.refresh_page();
    }

    /// Items of the active page as JSON, `[]` when none is open.
    pub fn items_json(&self) -> String {
        let items = self.session.items();
        serde_json::to_string(items.as_slice()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn render_svg(&self) -> String {
        self.session.render_svg()
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Forward one `InputEvent` (JSON). Returns the `EventOutcome` as
    /// JSON, e.g. `{"outcome":"handled"}`.
    pub fn handle_event(&mut self, event_json: &str) -> String {
        let outcome = match serde_json::from_str::<InputEvent>(event_json) {
            Ok(event) => self.session.handle_event(event),
            Err(e) => {
                log::warn!("malformed input event: {e}");
                EventOutcome::Ignored
            }
        };
        outcome_json(&outcome)
    }

    /// Keyboard shortcut entry point with the modifier flags spelled out.
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let modifiers = Modifiers { shift, ctrl, alt, meta };
        let outcome = self.session.handle_event(InputEvent::key(key, modifiers));
        outcome_json(&outcome)
    }

    // ─── Toolbar ─────────────────────────────────────────────────────────

    /// Current `ToolbarState` as JSON.
    pub fn toolbar_json(&self) -> String {
        serde_json::to_string(&self.session.toolbar()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn set_tool(&mut self, name: &str) {
        self.session.set_tool(tool_from_name(name));
    }

    pub fn set_draw_color(&mut self, color: &str) {
        self.session.set_draw_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.session.set_stroke_width(width);
    }

    pub fn set_eraser_mode(&mut self, mode: &str) {
        let mode = match mode {
            "pixel" => EraserMode::Pixel,
            _ => EraserMode::Object,
        };
        self.session.set_eraser_mode(mode);
    }

    pub fn set_eraser_radius(&mut self, radius: f64) {
        self.session.set_eraser_radius(radius);
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    /// Call `callback(canUndo, canRedo)` whenever the history changes.
    /// Replaces any previous callback.
    pub fn on_history_change(&mut self, callback: Function) {
        if let Some(old) = self.history_listener.take() {
            self.session.unsubscribe(old);
        }
        let id = self.session.subscribe(move |status| {
            let result = callback.call2(
                &JsValue::NULL,
                &JsValue::from_bool(status.can_undo),
                &JsValue::from_bool(status.can_redo),
            );
            if let Err(e) = result {
                log::warn!("history callback threw: {e:?}");
            }
        });
        self.history_listener = Some(id);
    }

    pub fn clear_drawings(&mut self) -> u32 {
        u32::try_from(self.session.clear_drawings()).unwrap_or(u32::MAX)
    }

    pub fn delete_selected(&mut self) -> bool {
        self.session.delete_selected()
    }

    /// Selected item id, or empty string if none.
    pub fn selected_id(&self) -> String {
        self.session
            .selection()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    pub fn focus_text(&mut self, item_id: &str) -> bool {
        self.session.focus_text(ItemId::intern(item_id))
    }

    pub fn focus_cell(&mut self, item_id: &str, row: usize, col: usize) -> bool {
        self.session.focus_cell(ItemId::intern(item_id), CellPos::new(row, col))
    }

    /// The focused widget's markup changed; `caret` is a plain-text offset.
    pub fn region_input(&mut self, content: &str, caret: usize) -> bool {
        self.session.region_input(content, caret)
    }

    pub fn set_caret(&mut self, caret: usize) {
        self.session.set_caret(caret);
    }

    /// Markup the focused widget should now show (after a local undo or a
    /// paste), or empty string when nothing is focused.
    pub fn editing_content(&self) -> String {
        self.session.editing_content().unwrap_or_default()
    }

    pub fn blur_editing(&mut self) {
        self.session.blur_editing();
    }

    pub fn paste(&mut self, html: Option<String>, plain: &str) -> bool {
        self.session.paste(html.as_deref(), plain)
    }

    /// Selected cells as `{"plain":…,"html":…}`, or empty string.
    pub fn copy_cells(&self) -> String {
        self.session
            .copy_cells()
            .and_then(|payload| serde_json::to_string(&payload).ok())
            .unwrap_or_default()
    }

    pub fn add_table_row(&mut self, item_id: &str, at: usize) -> bool {
        self.session.add_table_row(ItemId::intern(item_id), at)
    }

    pub fn delete_table_row(&mut self, item_id: &str, at: usize) -> bool {
        self.session.delete_table_row(ItemId::intern(item_id), at)
    }

    pub fn add_table_column(&mut self, item_id: &str, at: usize) -> bool {
        self.session.add_table_column(ItemId::intern(item_id), at)
    }

    pub fn delete_table_column(&mut self, item_id: &str, at: usize) -> bool {
        self.session.delete_table_column(ItemId::intern(item_id), at)
    }

    pub fn set_sticky_color(&mut self, item_id: &str, color: &str) -> bool {
        self.session.set_sticky_color(ItemId::intern(item_id), color)
    }

    /// Returns the new entry id, or empty string.
    pub fn add_todo_entry(&mut self, item_id: &str, text: &str) -> String {
        self.session
            .add_todo_entry(ItemId::intern(item_id), text)
            .unwrap_or_default()
    }

    pub fn toggle_todo_entry(&mut self, item_id: &str, entry_id: &str) -> bool {
        self.session.toggle_todo_entry(ItemId::intern(item_id), entry_id)
    }

    pub fn remove_todo_entry(&mut self, item_id: &str, entry_id: &str) -> bool {
        self.session.remove_todo_entry(ItemId::intern(item_id), entry_id)
    }

    pub fn add_tag(&mut self, item_id: &str, tag: &str) -> bool {
        self.session.add_tag(ItemId::intern(item_id), tag)
    }

    pub fn remove_tag(&mut self, item_id: &str, tag: &str) -> bool {
        self.session.remove_tag(ItemId::intern(item_id), tag)
    }

    // ─── Media ───────────────────────────────────────────────────────────

    /// Import a file read as a data URL, dropped at screen `(x, y)`.
    /// Returns a decode token for images; the host reports the natural
    /// size through `image_decoded`.
    pub fn import_file(&mut self, name: &str, mime_type: &str, data_url: &str, x: f64, y: f64) -> Option<u32> {
        let file = ImportedFile {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data_url: data_url.to_string(),
        };
        let token = self.session.import_file(file, Point::new(x, y))?;
        u32::try_from(token.0).ok()
    }

    /// Returns the placed image's id, or empty string.
    pub fn image_decoded(&mut self, token: u32, natural_width: f64, natural_height: f64) -> String {
        self.session
            .image_decoded(UploadToken(u64::from(token)), natural_width, natural_height)
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn upload_failed(&mut self, token: u32, reason: &str) {
        self.session.upload_failed(UploadToken(u64::from(token)), reason);
    }

    /// Start recording once the host's permission request settled.
    /// `denied_reason` is `None` when access was granted.
    pub fn start_recording(&mut self, kind: &str, denied_reason: Option<String>, x: f64, y: f64) -> bool {
        let kind = match kind {
            "video" => RecordingKind::Video,
            _ => RecordingKind::Audio,
        };
        let mut grant = HostGrant(denied_reason.map_or(Ok(()), Err));
        self.session.start_recording(&mut grant, kind, Point::new(x, y))
    }

    /// Returns the placed clip's id, or empty string.
    pub fn stop_recording(&mut self, data_url: &str) -> String {
        self.session
            .stop_recording(data_url)
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    /// Drain pending notifications as a JSON array of `Notice`.
    pub fn take_notices_json(&mut self) -> String {
        serde_json::to_string(&self.session.take_notices()).unwrap_or_else(|_| "[]".to_string())
    }
}

fn outcome_json(outcome: &EventOutcome) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|_| r#"{"outcome":"ignored"}"#.to_string())
}

fn tool_from_name(name: &str) -> ToolKind {
    match name {
        "text" => ToolKind::Text,
        "sticky" => ToolKind::Sticky,
        "table" => ToolKind::Table,
        "todo" => ToolKind::Todo,
        "draw" => ToolKind::Draw,
        "eraser" => ToolKind::Eraser,
        _ => ToolKind::Select,
    }
}

// ─── Panic hook and console logging ─────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("NC WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
            if log::set_logger(&CONSOLE_LOGGER).is_ok() {
                log::set_max_level(log::LevelFilter::Info);
            }
        });
    }
}

/// Forwards `log` records to the browser console, one console method per
/// level.
struct ConsoleLogger;

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = console_line(record);
        #[cfg(target_arch = "wasm32")]
        {
            let line = JsValue::from_str(&line);
            match record.level() {
                log::Level::Error => web_sys::console::error_1(&line),
                log::Level::Warn => web_sys::console::warn_1(&line),
                log::Level::Info => web_sys::console::info_1(&line),
                log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        drop(line);
    }

    fn flush(&self) {}
}

fn console_line(record: &log::Record<'_>) -> String {
    format!("[{} {}] {}", record.level(), record.target(), record.args())
}

// ─── Standalone validation (no canvas needed) ────────────────────────────

/// Validate a page's item list. Returns JSON: `{"ok":true,"count":N}` or
/// `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate_items(items_json: &str) -> String {
    let checked = serde_json::from_str::<Vec<CanvasItem>>(items_json)
        .map_err(nc_core::CanvasError::from)
        .and_then(|items| {
            items.iter().try_for_each(CanvasItem::validate)?;
            Ok(items.len())
        });
    let value = match checked {
        Ok(count) => serde_json::json!({ "ok": true, "count": count }),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
    };
    value.to_string()
}

/// Render an item list at identity view, e.g. for page thumbnails.
/// Returns an empty string on invalid JSON.
#[wasm_bindgen]
pub fn render_items_svg(items_json: &str, width: f64, height: f64) -> String {
    match serde_json::from_str::<Vec<CanvasItem>>(items_json) {
        Ok(items) => nc_render::svg::render_page_svg(&items, &ViewTransform::default(), width, height),
        Err(e) => {
            log::warn!("cannot render items: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"[
        {"id": "w_sticky", "type": "sticky", "x": 0, "y": 0, "width": 200, "height": 200, "content": "hi"}
    ]"#;

    #[test]
    fn open_page_and_round_trip_items() {
        let mut canvas = NoteCanvas::new(800.0, 600.0, None);
        assert!(canvas.open_page("nb", "sec", "p", PAGE));
        let items: Vec<CanvasItem> = serde_json::from_str(&canvas.items_json()).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!canvas.open_page("nb", "sec", "p2", "not json"));
    }

    #[test]
    fn events_arrive_as_json() {
        let mut canvas = NoteCanvas::new(800.0, 600.0, Some(r#"{"dragThreshold": 2}"#.into()));
        canvas.open_page("nb", "sec", "p", PAGE);
        let down = r#"{"type":"pointerDown","x":10,"y":10,"target":{"kind":"handle","id":"w_sticky"}}"#;
        assert_eq!(canvas.handle_event(down), r#"{"outcome":"handled"}"#);
        canvas.handle_event(r#"{"type":"pointerMove","x":60,"y":10}"#);
        canvas.handle_event(r#"{"type":"pointerUp","x":60,"y":10}"#);
        assert_eq!(canvas.selected_id(), "w_sticky");
        assert!(canvas.toolbar_json().contains(r#""canUndo":true"#));
        assert_eq!(canvas.handle_event("{}"), r#"{"outcome":"ignored"}"#);
    }

    #[test]
    fn denied_recording_queues_notice() {
        let mut canvas = NoteCanvas::new(800.0, 600.0, None);
        canvas.open_page("nb", "sec", "p", "[]");
        assert!(!canvas.start_recording("audio", Some("NotAllowedError".into()), 0.0, 0.0));
        let notices: serde_json::Value = serde_json::from_str(&canvas.take_notices_json()).unwrap();
        assert_eq!(notices[0]["type"], "permissionDenied");
        assert_eq!(notices[0]["reason"], "NotAllowedError");
    }

    #[test]
    fn validate_items_reports_errors() {
        assert_eq!(validate_items(PAGE), r#"{"count":1,"ok":true}"#);
        let bad = r#"[{"id":"x","type":"text","x":0,"y":0,"width":0,"height":10,"content":""}]"#;
        assert!(validate_items(bad).contains(r#""ok":false"#));
    }

    #[test]
    fn console_line_carries_level_and_target() {
        let line = console_line(
            &log::Record::builder()
                .args(format_args!("update of sticky_1 dropped"))
                .level(log::Level::Warn)
                .target("nc_editor::canvas")
                .build(),
        );
        assert_eq!(line, "[WARN nc_editor::canvas] update of sticky_1 dropped");
    }

    #[test]
    fn reopening_a_page_resets_history() {
        let mut canvas = NoteCanvas::new(800.0, 600.0, None);
        canvas.open_page("nb", "sec", "p", PAGE);
        assert!(!canvas.delete_selected());
        assert!(canvas.session.delete_item(ItemId::intern("w_sticky")));
        assert!(canvas.toolbar_json().contains(r#""canUndo":true"#));
        assert!(canvas.open_page("nb", "sec", "p", PAGE));
        assert!(canvas.toolbar_json().contains(r#""canUndo":false"#));
        canvas.close_page();
        assert_eq!(canvas.items_json(), "[]");
    }

    #[test]
    fn thumbnail_render_needs_valid_json() {
        assert!(render_items_svg(PAGE, 200.0, 100.0).contains(r#"data-id="w_sticky""#));
        assert_eq!(render_items_svg("[", 200.0, 100.0), "");
    }
}
