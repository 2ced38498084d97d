//! # Tool Table Core
//!
//! Core types for the LinuxCNC tool table.
//! Provides the tool record model, the `tool.tbl` codec and changeset
//! computation used to reconcile a table against a relational store.

pub mod changeset;
pub mod codec;
pub mod error;
pub mod record;
pub mod table;

pub use changeset::{Changeset, Update};
pub use codec::{
    decode, encode, read_table_file, render_header, write_table_file, DecodedTable, HeaderBlock,
    HeaderTemplate,
};
pub use error::{Error, ParseError, ReconciliationError, Result};
pub use record::{
    Column, ColumnKind, ToolRecord, ToolValue, INVALID_TOOL_NUMBER, NEW_TOOL_REMARK,
    NO_TOOL_NUMBER, NO_TOOL_REMARK,
};
pub use table::{ColumnSet, ToolTable};

/// Library version, written into generated file headers
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
