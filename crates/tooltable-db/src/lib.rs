//! # Tool Table DB
//!
//! Relational storage for the tool table: a row model, the [`ToolStore`]
//! seam with SQLite and in-memory implementations, and the
//! [`RelationalAdapter`] that reconciles a table against a store.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod model;
pub mod sqlite;
pub mod traits;

pub use adapter::RelationalAdapter;
pub use error::{DbError, DbResult};
pub use memory::MemoryToolStore;
pub use model::{ToolRow, TOOL_TABLE_ID};
pub use sqlite::SqliteToolStore;
pub use traits::ToolStore;
