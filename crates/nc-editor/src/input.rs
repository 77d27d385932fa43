//! Input abstraction layer.
//!
//! Normalizes pointer, wheel, pinch, and keyboard events from the host
//! into a unified `InputEvent` consumed by `CanvasSession`. Positions are
//! screen space, relative to the canvas origin.

use nc_core::geometry::Point;
use nc_core::id::ItemId;
use nc_core::table::CellPos;
use serde::{Deserialize, Serialize};

/// Keyboard modifier state at the time of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl on most platforms, ⌘ on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    pub fn cmd() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn cmd_shift() -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::NONE
        }
    }
}

/// What the host found under the pointer.
///
/// The host knows its widget layout; the session only needs to know which
/// sub-region of which item was hit. `Canvas` means "nothing specific", in
/// which case the session hit-tests the item bounds itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PointerTarget {
    #[default]
    Canvas,
    /// The drag handle of an item.
    Handle { id: ItemId },
    /// The resize grip of an item.
    ResizeHandle { id: ItemId },
    /// An editable text body. Pointer-down here never starts a drag.
    Editable { id: ItemId },
    /// A table cell.
    Cell { id: ItemId, row: usize, col: usize },
}

impl PointerTarget {
    pub fn cell(&self) -> Option<(ItemId, CellPos)> {
        match *self {
            PointerTarget::Cell { id, row, col } => Some((id, CellPos::new(row, col))),
            _ => None,
        }
    }
}

/// A normalized input event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        target: PointerTarget,
        #[serde(default)]
        modifiers: Modifiers,
    },

    /// Tracked on the whole input surface for the lifetime of a gesture.
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default)]
        target: PointerTarget,
    },

    PointerUp { x: f64, y: f64 },

    /// Wheel or trackpad scroll at cursor `(x, y)`.
    Wheel {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },

    /// Two touch points went down.
    PinchStart { a: Point, b: Point },

    PinchMove { a: Point, b: Point },

    PinchEnd,

    Key {
        key: String,
        #[serde(default)]
        modifiers: Modifiers,
    },

    /// The window lost focus; every gesture in flight is dropped.
    Blur,
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64, target: PointerTarget) -> Self {
        Self::PointerDown {
            x,
            y,
            target,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove {
            x,
            y,
            target: PointerTarget::Canvas,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp { x, y }
    }

    pub fn key(key: &str, modifiers: Modifiers) -> Self {
        Self::Key {
            key: key.to_string(),
            modifiers,
        }
    }

    /// Extract position if this is a pointer event.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y }
            | Self::Wheel { x, y, .. } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }
}
