//! Tool table encoder and file I/O

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::codec::header::{compose_header, HeaderBlock, HeaderTemplate};
use crate::codec::parser::{decode, DecodedTable};
use crate::codec::tokenizer::remark_needs_guard;
use crate::error::{Error, Result};
use crate::record::{Column, ColumnKind, ToolRecord};
use crate::table::{ColumnSet, ToolTable};

/// Width of integer columns (tool, pocket, orientation)
pub const INT_COLUMN_WIDTH: usize = 6;
/// Width of float columns
pub const FLOAT_COLUMN_WIDTH: usize = 12;
/// Decimal places written for float columns
pub const FLOAT_DECIMAL_PLACES: usize = 6;

fn column_width(column: Column) -> usize {
    match column.kind() {
        ColumnKind::Integer => INT_COLUMN_WIDTH,
        _ => FLOAT_COLUMN_WIDTH,
    }
}

/// Build the header lines for a rewrite, rendering the template at the
/// current local time.
pub fn render_header(
    preserved: &HeaderBlock,
    template: Option<&HeaderTemplate>,
    version: &str,
) -> Vec<String> {
    render_header_at(preserved, template, version, &Local::now())
}

/// Build the header lines for a rewrite at a fixed time.
///
/// A template that fails to render is skipped.
pub fn render_header_at(
    preserved: &HeaderBlock,
    template: Option<&HeaderTemplate>,
    version: &str,
    now: &DateTime<Local>,
) -> Vec<String> {
    let rendered = template.and_then(|t| match t.render(version, now) {
        Ok(lines) => Some(lines),
        Err(e) => {
            tracing::warn!("Ignoring tool table header template: {}", e);
            None
        }
    });
    compose_header(preserved, rendered)
}

/// Column title row, e.g. `;Tool  Pocket Z Offset     Remark`
pub fn title_row(columns: &ColumnSet) -> String {
    let first = columns.first();
    let mut items: Vec<String> = columns
        .iter()
        .filter(Column::is_numeric)
        .map(|column| {
            // the leading ';' takes one character from the first column
            let width = column_width(column) - usize::from(Some(column) == first);
            format!("{:<width$}", column.label(), width = width)
        })
        .collect();
    items.push(Column::R.label().to_string());
    format!(";{}", items.join(" "))
}

/// Format one tool row for the selected columns
pub fn format_row(tool: &ToolRecord, columns: &ColumnSet) -> String {
    let mut row = String::new();
    for column in columns.iter().filter(Column::is_numeric) {
        let value = tool.get(column);
        match column.kind() {
            ColumnKind::Integer => row.push_str(&format!(
                "{}{:<width$}",
                column.id(),
                value.as_i32().unwrap_or_default(),
                width = INT_COLUMN_WIDTH
            )),
            _ => row.push_str(&format!(
                "{}{:<+width$.prec$}",
                column.id(),
                value.as_f64().unwrap_or_default(),
                width = FLOAT_COLUMN_WIDTH,
                prec = FLOAT_DECIMAL_PLACES
            )),
        }
    }

    let mut comment = String::new();
    if columns.contains(Column::Stl) && !tool.model_path.is_empty() {
        comment.push_str(&format!("[{}]", tool.model_path));
    }
    if columns.contains(Column::Color) && !tool.path_color.is_empty() {
        comment.push_str(&format!("[{}]", tool.path_color));
    }
    if remark_needs_guard(&tool.remark) {
        comment.push_str("[]");
    }
    comment.push_str(&tool.remark);

    if !comment.is_empty() {
        row.push_str("; ");
        row.push_str(&comment);
    }
    row
}

/// Encode a tool table.
///
/// Writes the header lines, the column title row, then one row per tool
/// above the sentinel in ascending order. The output ends with a newline.
pub fn encode(table: &ToolTable, columns: &ColumnSet, header: &[String]) -> String {
    let mut lines: Vec<String> = header.to_vec();
    lines.push(title_row(columns));
    lines.extend(table.tools().map(|tool| format_row(tool, columns)));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Read and decode a tool table file.
///
/// A missing file is [`Error::SourceUnavailable`].
pub fn read_table_file(path: &Path) -> Result<DecodedTable> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(decode(&text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::SourceUnavailable {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(Error::Persistence(e)),
    }
}

/// Write tool table text durably.
///
/// The data is flushed and fsynced before returning so a controller
/// reloading the file right after never sees a truncated table.
pub fn write_table_file(path: &Path, text: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    tracing::debug!("Wrote {} bytes to {}", text.len(), path.display());
    Ok(())
}
