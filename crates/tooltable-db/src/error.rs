//! Error types for the relational tool store.
//!
//! Driver failures and reconciliation failures are kept apart so callers
//! can tell a broken connection from a store that is out of step with the
//! snapshot it was diffed against.

use thiserror::Error;
use tooltable_core::ReconciliationError;

/// Errors that can occur while reading or writing the tool store.
#[derive(Error, Debug)]
pub enum DbError {
    /// Database driver error.
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The store does not hold a row the changeset expects.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// A stored row cannot be mapped onto a tool record.
    #[error("Invalid row for tool {tool_number}: {reason}")]
    InvalidRow { tool_number: i32, reason: String },

    /// The store URL could not be used.
    #[error("Invalid store URL '{0}'")]
    InvalidUrl(String),
}

impl DbError {
    /// Check if this is a reconciliation error
    pub fn is_reconciliation_error(&self) -> bool {
        matches!(self, DbError::Reconciliation(_))
    }
}

impl From<DbError> for tooltable_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Reconciliation(e) => tooltable_core::Error::Reconciliation(e),
            other => tooltable_core::Error::Store(other.to_string()),
        }
    }
}

/// Result type alias for store operations.
pub type DbResult<T> = Result<T, DbError>;
