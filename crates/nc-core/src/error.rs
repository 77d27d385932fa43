//! Error types for canvas model and store operations.

use crate::id::ItemId;
use thiserror::Error;

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;

/// Errors raised by the model, the path parser, and the page store.
///
/// Input handling in the editor never surfaces these to a global handler;
/// it logs and degrades to a no-op.
#[derive(Debug, Error)]
pub enum CanvasError {
    /// No page is addressed by the given key (or no page is active).
    #[error("page not found: {0}")]
    PageNotFound(String),

    /// No item with this id on the addressed page.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// An item with this id already lives on the page.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    /// Tag operations are only defined for text items.
    #[error("item {0} is not a text item")]
    NotATextItem(ItemId),

    /// Malformed path-description string.
    #[error("invalid path at byte {offset}: {reason}")]
    InvalidPath { offset: usize, reason: String },

    /// Table shape or style map violates its invariants.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Non-finite or non-positive geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Page or item (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
