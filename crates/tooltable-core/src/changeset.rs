//! Changeset computation
//!
//! Compares a persisted snapshot against the desired table by tool number
//! and yields the inserts, updates and deletes needed to reconcile them.
//! The sentinel never participates.

use std::collections::BTreeMap;

use crate::record::{ToolRecord, NO_TOOL_NUMBER};
use crate::table::ToolTable;

/// An updated row: what is stored and what should be stored
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Persisted record
    pub old: ToolRecord,
    /// Desired record, written in full
    pub new: ToolRecord,
}

/// Inserts, updates and deletes keyed by tool number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    /// Tools only in the desired table
    pub inserted: BTreeMap<i32, ToolRecord>,
    /// Tools in both tables with differing fields
    pub updated: BTreeMap<i32, Update>,
    /// Tools only in the persisted table
    pub deleted: BTreeMap<i32, ToolRecord>,
}

impl Changeset {
    /// Diff `persisted` against `desired`
    pub fn between(persisted: &ToolTable, desired: &ToolTable) -> Self {
        let mut changes = Self::default();

        for tool in desired.iter().filter(|t| t.tool_number != NO_TOOL_NUMBER) {
            match persisted.get(tool.tool_number) {
                None => {
                    changes.inserted.insert(tool.tool_number, tool.clone());
                }
                Some(old) if old != tool => {
                    changes.updated.insert(
                        tool.tool_number,
                        Update {
                            old: old.clone(),
                            new: tool.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for tool in persisted.iter().filter(|t| t.tool_number != NO_TOOL_NUMBER) {
            if !desired.contains(tool.tool_number) {
                changes.deleted.insert(tool.tool_number, tool.clone());
            }
        }

        changes
    }

    /// Check if nothing needs to change
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of row operations
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    /// Inserted tool numbers, ascending
    pub fn inserted_numbers(&self) -> Vec<i32> {
        self.inserted.keys().copied().collect()
    }

    /// Updated tool numbers, ascending
    pub fn updated_numbers(&self) -> Vec<i32> {
        self.updated.keys().copied().collect()
    }

    /// Deleted tool numbers, ascending
    pub fn deleted_numbers(&self) -> Vec<i32> {
        self.deleted.keys().copied().collect()
    }
}

impl std::fmt::Display for Changeset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted",
            self.inserted.len(),
            self.updated.len(),
            self.deleted.len()
        )
    }
}
