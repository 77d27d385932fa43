pub mod canvas;
pub mod cells;
pub mod config;
pub mod draw;
pub mod history;
pub mod input;
pub mod local_history;
pub mod manipulate;
pub mod media;
pub mod richtext;
pub mod shortcuts;
pub mod tools;
pub mod viewport;

pub use canvas::{CanvasSession, EventOutcome};
pub use config::EditorConfig;
pub use history::{GlobalHistory, HistoryAction, HistoryStatus};
pub use input::{InputEvent, Modifiers, PointerTarget};
pub use tools::{EraserMode, ToolKind, ToolbarState};
