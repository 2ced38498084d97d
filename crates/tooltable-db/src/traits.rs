use async_trait::async_trait;

use crate::error::DbResult;
use crate::model::ToolRow;

/// Row-level access to a relational tool store.
///
/// Each call is its own commit. `update` and `delete` fail with a
/// reconciliation error when the tool number is not stored; `insert`
/// fails the same way when it already is.
#[async_trait]
pub trait ToolStore: Send + Sync {
    /// All stored rows, ascending by tool number
    async fn load_rows(&self) -> DbResult<Vec<ToolRow>>;

    /// Insert a new row
    async fn insert(&self, row: &ToolRow) -> DbResult<()>;

    /// Overwrite every field of the row with the same tool number
    async fn update(&self, row: &ToolRow) -> DbResult<()>;

    /// Delete the row for a tool number
    async fn delete(&self, tool_no: i64) -> DbResult<()>;
}
