//! Tool table decoder

use crate::codec::header::HeaderBlock;
use crate::codec::tokenizer::{split_comment, split_row, tokenize};
use crate::error::ParseError;
use crate::record::{Column, ColumnKind, ToolRecord, ToolValue, INVALID_TOOL_NUMBER};
use crate::table::ToolTable;

/// Result of decoding a tool table file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTable {
    /// Preserved user header
    pub header: HeaderBlock,
    /// Tools, sentinel included
    pub table: ToolTable,
    /// Per-field coercion failures encountered while decoding
    pub diagnostics: Vec<ParseError>,
}

/// Decode tool table text.
///
/// The last line starting with `;` marks the start of the tool rows; lines
/// before it form the header. Without such a line the result holds only
/// the sentinel. Malformed fields never fail the whole decode: they are
/// reported in [`DecodedTable::diagnostics`] and the row keeps its defaults.
pub fn decode(text: &str) -> DecodedTable {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let mut decoded = DecodedTable {
        table: ToolTable::with_sentinel(),
        ..DecodedTable::default()
    };

    let Some(marker) = lines.iter().rposition(|l| l.starts_with(';')) else {
        tracing::debug!("No column title row found, tool table is empty");
        return decoded;
    };

    decoded.header = HeaderBlock::from_raw(&lines[..marker]);

    for (index, line) in lines.iter().enumerate().skip(marker + 1) {
        let line_number = index + 1;
        let (tool, error) = decode_row(line, line_number);

        if let Some(error) = error {
            tracing::error!("{}", error);
            decoded.diagnostics.push(error);
        }

        if tool.tool_number == INVALID_TOOL_NUMBER {
            if !line.is_empty() {
                tracing::trace!("Skipping line {} without a tool number", line_number);
            }
            continue;
        }

        if decoded.table.insert(tool).is_some() {
            tracing::debug!("Line {} replaces an earlier row for the same tool", line_number);
        }
    }

    decoded.table.ensure_sentinel();
    decoded
}

/// Decode one tool row.
///
/// Returns the record and the coercion failure that cut the row short, if
/// any. Tokens after a failure are not applied.
pub fn decode_row(line: &str, line_number: usize) -> (ToolRecord, Option<ParseError>) {
    let (data, comment) = split_row(line);
    let mut tool = ToolRecord::default();
    let mut failure = None;

    for token in tokenize(data) {
        let Some(column) = Column::from_descriptor(token.descriptor()) else {
            continue;
        };
        match coerce(column, &token.value, line_number) {
            Ok(value) => {
                // coerce always yields the column's own kind
                let _ = tool.set(column, value);
            }
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    let parts = split_comment(comment.unwrap_or_default());
    tool.remark = parts.remark;
    tool.model_path = parts.model_path.unwrap_or_default();
    tool.path_color = parts.path_color.unwrap_or_default();

    (tool, failure)
}

fn coerce(column: Column, value: &str, line_number: usize) -> Result<ToolValue, ParseError> {
    match column.kind() {
        ColumnKind::Integer => value
            .parse::<i32>()
            .map(ToolValue::Int)
            .map_err(|_| ParseError::InvalidInteger {
                line_number,
                column,
                value: value.to_string(),
            }),
        _ => value
            .parse::<f64>()
            .map(ToolValue::Float)
            .map_err(|_| ParseError::InvalidFloat {
                line_number,
                column,
                value: value.to_string(),
            }),
    }
}
