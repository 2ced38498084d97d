//! Tool table and column selection
//!
//! A [`ToolTable`] maps tool numbers to records and always iterates in
//! ascending tool number order. A [`ColumnSet`] is the validated list of
//! columns read from or written to the tool table file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::record::{Column, ToolRecord, ToolValue, NO_TOOL_NUMBER};

/// Mapping of tool number to tool record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolTable {
    tools: BTreeMap<i32, ToolRecord>,
}

impl ToolTable {
    /// Create an empty table (no sentinel)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding only the "no tool loaded" sentinel
    pub fn with_sentinel() -> Self {
        let mut table = Self::new();
        table.ensure_sentinel();
        table
    }

    /// Insert the sentinel at tool number 0, replacing any existing entry
    pub fn ensure_sentinel(&mut self) {
        self.tools.insert(NO_TOOL_NUMBER, ToolRecord::no_tool());
    }

    /// Add or replace a tool, keyed by its tool number
    pub fn insert(&mut self, tool: ToolRecord) -> Option<ToolRecord> {
        self.tools.insert(tool.tool_number, tool)
    }

    /// Remove a tool
    pub fn remove(&mut self, tool_number: i32) -> Option<ToolRecord> {
        self.tools.remove(&tool_number)
    }

    /// Get a tool if present
    pub fn get(&self, tool_number: i32) -> Option<&ToolRecord> {
        self.tools.get(&tool_number)
    }

    /// Get a tool, failing with [`Error::UnknownTool`] when absent
    pub fn tool(&self, tool_number: i32) -> Result<&ToolRecord> {
        self.tools
            .get(&tool_number)
            .ok_or(Error::UnknownTool { tool_number })
    }

    /// Check whether a tool number is present
    pub fn contains(&self, tool_number: i32) -> bool {
        self.tools.contains_key(&tool_number)
    }

    /// All records in ascending tool number order, sentinel included
    pub fn iter(&self) -> impl Iterator<Item = &ToolRecord> {
        self.tools.values()
    }

    /// Real tools (tool number above the sentinel) in ascending order
    pub fn tools(&self) -> impl Iterator<Item = &ToolRecord> {
        self.tools
            .range(NO_TOOL_NUMBER + 1..)
            .map(|(_, tool)| tool)
    }

    /// Tool numbers in ascending order
    pub fn tool_numbers(&self) -> impl Iterator<Item = i32> + '_ {
        self.tools.keys().copied()
    }

    /// Copy of this table without the sentinel
    pub fn without_sentinel(&self) -> Self {
        let mut table = self.clone();
        table.tools.remove(&NO_TOOL_NUMBER);
        table
    }

    /// Number of entries, sentinel included
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number a new tool receives when none is given
    pub fn next_tool_number(&self) -> i32 {
        self.tools
            .keys()
            .next_back()
            .map_or(1, |last| (*last).max(NO_TOOL_NUMBER) + 1)
    }

    /// Values of the selected columns for every real tool, ascending
    pub fn rows(&self, columns: &ColumnSet) -> Vec<Vec<ToolValue>> {
        self.tools()
            .map(|tool| columns.iter().map(|c| tool.get(c)).collect())
            .collect()
    }
}

impl FromIterator<ToolRecord> for ToolTable {
    fn from_iter<I: IntoIterator<Item = ToolRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for tool in iter {
            table.insert(tool);
        }
        table
    }
}

impl<'a> IntoIterator for &'a ToolTable {
    type Item = &'a ToolRecord;
    type IntoIter = std::collections::btree_map::Values<'a, i32, ToolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.values()
    }
}

/// Validated, ordered selection of columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet(Vec<Column>);

impl ColumnSet {
    /// Every column, in file order
    pub fn all() -> Self {
        Self(Column::all().to_vec())
    }

    /// Parse a string of single-letter column identifiers, e.g. `"PTDZR"`.
    ///
    /// Returns `None` when no valid column remains.
    pub fn parse(spec: &str) -> Option<Self> {
        Self::from_ids(spec.chars().map(|c| c.to_string()))
    }

    /// Build from a list of identifiers such as `["T", "Z", "STL"]`.
    ///
    /// Identifiers are trimmed and matched case-insensitively; unknown and
    /// duplicate identifiers are dropped. Returns `None` when nothing valid
    /// remains.
    pub fn from_ids<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut columns = Vec::new();
        for id in ids {
            if let Some(column) = Column::from_id(id.as_ref()) {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        if columns.is_empty() {
            None
        } else {
            Some(Self(columns))
        }
    }

    /// Parse `spec`, falling back to `fallback` when it holds no valid column
    pub fn parse_or(spec: &str, fallback: &ColumnSet) -> Self {
        Self::parse(spec).unwrap_or_else(|| fallback.clone())
    }

    /// Columns in order
    pub fn iter(&self) -> impl Iterator<Item = Column> + '_ {
        self.0.iter().copied()
    }

    /// Check if a column is selected
    pub fn contains(&self, column: Column) -> bool {
        self.0.contains(&column)
    }

    /// First selected column
    pub fn first(&self) -> Option<Column> {
        self.0.first().copied()
    }

    /// Number of selected columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ColumnSet {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Display for ColumnSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for column in &self.0 {
            write!(f, "{}", column.id())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_sentinel() {
        let table = ToolTable::with_sentinel();
        assert_eq!(table.len(), 1);
        assert!(table.get(0).unwrap().is_no_tool());
        assert_eq!(table.tools().count(), 0);
    }

    #[test]
    fn test_unknown_tool() {
        let table = ToolTable::with_sentinel();
        let err = table.tool(9).unwrap_err();
        assert!(err.is_unknown_tool());
    }

    #[test]
    fn test_ascending_iteration() {
        let table: ToolTable = [5, 1, 3]
            .into_iter()
            .map(ToolRecord::new_tool)
            .collect();
        let numbers: Vec<i32> = table.tool_numbers().collect();
        assert_eq!(numbers, vec![1, 3, 5]);
        assert_eq!(table.next_tool_number(), 6);
    }

    #[test]
    fn test_next_tool_number_empty() {
        assert_eq!(ToolTable::new().next_tool_number(), 1);
        assert_eq!(ToolTable::with_sentinel().next_tool_number(), 1);
    }

    #[test]
    fn test_rows_selects_columns() {
        let mut table = ToolTable::with_sentinel();
        table.insert(ToolRecord::new_tool(2));
        let columns = ColumnSet::parse("TZR").unwrap();
        let rows = table.rows(&columns);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            vec![
                ToolValue::Int(2),
                ToolValue::Float(0.0),
                ToolValue::from("New Tool")
            ]
        );
    }

    #[test]
    fn test_column_set_parse() {
        let columns = ColumnSet::parse("ptdzr").unwrap();
        assert_eq!(columns.to_string(), "PTDZR");
        assert_eq!(columns.first(), Some(Column::P));

        let columns = ColumnSet::parse(" T, Z ?").unwrap();
        assert_eq!(columns.to_string(), "TZ");

        assert!(ColumnSet::parse("").is_none());
        assert!(ColumnSet::parse("kmn").is_none());
        assert_eq!(ColumnSet::parse_or("", &ColumnSet::all()), ColumnSet::all());
    }

    #[test]
    fn test_column_set_from_ids() {
        let columns = ColumnSet::from_ids(["t", " stl ", "color", "bogus", "T"]).unwrap();
        let ids: Vec<Column> = columns.iter().collect();
        assert_eq!(ids, vec![Column::T, Column::Stl, Column::Color]);
    }
}
