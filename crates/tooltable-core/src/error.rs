//! Error handling for the tool table
//!
//! Provides error types for every layer of the tool table:
//! - Parse errors (per-field coercion failures in tool.tbl rows)
//! - Reconciliation errors (relational store out of step with the snapshot)
//! - The unified [`Error`] used in public APIs
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::record::Column;

/// Per-field parse error
///
/// Raised when a token value in a tool row fails numeric coercion.
/// The row keeps the values parsed so far and defaults for the rest.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Value could not be converted to an integer
    #[error("Line {line_number}: cannot convert '{value}' to an integer for column {column}")]
    InvalidInteger {
        /// The 1-based line number in the source text.
        line_number: usize,
        /// The column being parsed.
        column: Column,
        /// The raw value text.
        value: String,
    },

    /// Value could not be converted to a float
    #[error("Line {line_number}: cannot convert '{value}' to a float for column {column}")]
    InvalidFloat {
        /// The 1-based line number in the source text.
        line_number: usize,
        /// The column being parsed.
        column: Column,
        /// The raw value text.
        value: String,
    },
}

impl ParseError {
    /// Line the error occurred on
    pub fn line_number(&self) -> usize {
        match self {
            ParseError::InvalidInteger { line_number, .. }
            | ParseError::InvalidFloat { line_number, .. } => *line_number,
        }
    }
}

/// Reconciliation error type
///
/// The relational store does not contain a row the changeset expects.
/// Rows applied before the failure are not rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Update target missing from the store
    #[error("Cannot update tool {tool_number}: no such row in the store")]
    MissingUpdateTarget {
        /// The tool number that was not found.
        tool_number: i32,
    },

    /// Delete target missing from the store
    #[error("Cannot delete tool {tool_number}: no such row in the store")]
    MissingDeleteTarget {
        /// The tool number that was not found.
        tool_number: i32,
    },

    /// Insert target already present in the store
    #[error("Cannot insert tool {tool_number}: row already exists in the store")]
    DuplicateInsert {
        /// The tool number that already exists.
        tool_number: i32,
    },
}

impl ReconciliationError {
    /// Tool number the failed operation targeted
    pub fn tool_number(&self) -> i32 {
        match self {
            ReconciliationError::MissingUpdateTarget { tool_number }
            | ReconciliationError::MissingDeleteTarget { tool_number }
            | ReconciliationError::DuplicateInsert { tool_number } => *tool_number,
        }
    }
}

/// Main error type for the tool table
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Backing file or store missing at load time
    #[error("Tool table source unavailable: {}", path.display())]
    SourceUnavailable {
        /// Path (or store URL) that was looked up.
        path: PathBuf,
    },

    /// Tool number not present in the table
    #[error("Tool {tool_number} is not in the tool table")]
    UnknownTool {
        /// The tool number that was looked up.
        tool_number: i32,
    },

    /// Value cannot be stored in a column
    #[error("Invalid value for column {column}: {reason}")]
    InvalidValue {
        /// The target column.
        column: Column,
        /// Why the value was rejected.
        reason: String,
    },

    /// Parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Reconciliation error
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// Write, flush or fsync failure while persisting
    #[error("Persistence I/O error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Relational store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration failure
    #[error("Config error: {0}")]
    Config(String),

    /// Machine controller failure
    #[error("Controller error: {0}")]
    Controller(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if the backing source was missing
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Error::SourceUnavailable { .. })
    }

    /// Check if this is an unknown tool lookup
    pub fn is_unknown_tool(&self) -> bool {
        matches!(self, Error::UnknownTool { .. })
    }

    /// Check if this is a reconciliation error
    pub fn is_reconciliation_error(&self) -> bool {
        matches!(self, Error::Reconciliation(_))
    }

    /// Check if this is a persistence I/O error
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownTool { tool_number: 42 };
        assert_eq!(err.to_string(), "Tool 42 is not in the tool table");

        let err = Error::SourceUnavailable {
            path: PathBuf::from("/tmp/tool.tbl"),
        };
        assert_eq!(
            err.to_string(),
            "Tool table source unavailable: /tmp/tool.tbl"
        );

        let err = ParseError::InvalidInteger {
            line_number: 3,
            column: Column::T,
            value: "1.5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Line 3: cannot convert '1.5' to an integer for column T"
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ReconciliationError::MissingDeleteTarget { tool_number: 7 }.into();
        assert!(err.is_reconciliation_error());
        assert_eq!(
            err.to_string(),
            "Cannot delete tool 7: no such row in the store"
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: Error = io_err.into();
        assert!(err.is_persistence_error());
    }
}
