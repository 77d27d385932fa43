//! Canvas keyboard shortcuts.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s, shared by
//! every host. Keys inside an editable region are routed by the session
//! first; only what it does not consume reaches this map.

use crate::input::Modifiers;
use crate::tools::ToolKind;

/// What a canvas shortcut asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Tool switching ──
    Tool(ToolKind),

    // ── Edit ──
    Undo,
    Redo,
    Delete,
    Copy,
    Cut,
    Paste,

    // ── View ──
    ZoomIn,
    ZoomOut,
    ZoomReset,

    // ── UI ──
    Deselect,
}

/// Static key table for the canvas.
///
/// On macOS `meta` is ⌘; elsewhere `ctrl` plays the same role.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Look up the binding for `key` under `modifiers`.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Delete"`).
    /// Unbound combos return `None` and the host keeps the native default.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.command();

        if cmd && modifiers.shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                "=" | "+" => Some(ShortcutAction::ZoomIn),
                "-" => Some(ShortcutAction::ZoomOut),
                "0" => Some(ShortcutAction::ZoomReset),
                _ => None,
            };
        }

        if modifiers.alt || modifiers.shift {
            return None;
        }

        match key {
            "v" | "V" => Some(ShortcutAction::Tool(ToolKind::Select)),
            "t" | "T" => Some(ShortcutAction::Tool(ToolKind::Text)),
            "n" | "N" => Some(ShortcutAction::Tool(ToolKind::Sticky)),
            "g" | "G" => Some(ShortcutAction::Tool(ToolKind::Table)),
            "l" | "L" => Some(ShortcutAction::Tool(ToolKind::Todo)),
            "p" | "P" => Some(ShortcutAction::Tool(ToolKind::Draw)),
            "e" | "E" => Some(ShortcutAction::Tool(ToolKind::Eraser)),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }

    /// Undo/redo only, for routing keys typed inside an editable region.
    pub fn history_key(key: &str, modifiers: Modifiers) -> Option<crate::local_history::HistoryKey> {
        use crate::local_history::HistoryKey;
        match Self::resolve(key, modifiers)? {
            ShortcutAction::Undo => Some(HistoryKey::Undo),
            ShortcutAction::Redo => Some(HistoryKey::Redo),
            _ => None,
        }
    }
}
