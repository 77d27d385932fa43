pub mod error;
pub mod geometry;
pub mod id;
pub mod model;
pub mod path;
pub mod store;
pub mod table;

pub use error::{CanvasError, CanvasResult};
pub use geometry::{Bounds, Point, ViewTransform};
pub use id::ItemId;
pub use model::*;
pub use store::{ActivePage, MemoryStore, PageKey, PageStore};
pub use table::{CellPos, CellRange, CellStyle, ColWidth, TableData};
