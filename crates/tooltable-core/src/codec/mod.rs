//! # Tool Table Codec
//!
//! Reads and writes the LinuxCNC `tool.tbl` flat-file format.
//!
//! ## Format
//!
//! ```text
//! LinuxCNC Tool Table            <- free text header, preserved
//! ---                            <- separator, generated lines follow
//! Generated by: ...
//!
//! ;Tool  Pocket Z Offset     Remark
//! T1     P1     Z+1.500000   ; [model.stl][#FF0000]1/4 end mill
//! ```
//!
//! The last line starting with `;` is the column title row and marks the
//! start of the tool rows. See [`tokenizer`] for the row grammar.

pub mod header;
pub mod parser;
pub mod tokenizer;
pub mod writer;

pub use header::{HeaderBlock, HeaderTemplate, TemplateError};
pub use parser::{decode, decode_row, DecodedTable};
pub use writer::{
    encode, read_table_file, render_header, render_header_at, write_table_file,
    FLOAT_COLUMN_WIDTH, FLOAT_DECIMAL_PLACES, INT_COLUMN_WIDTH,
};
