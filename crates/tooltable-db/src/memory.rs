//! In-process [`ToolStore`] used by tests and previews.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use tooltable_core::ReconciliationError;

use crate::error::DbResult;
use crate::model::{tool_number, ToolRow};
use crate::traits::ToolStore;

/// Tool store holding rows in memory
#[derive(Debug, Default)]
pub struct MemoryToolStore {
    rows: RwLock<BTreeMap<i64, ToolRow>>,
}

impl MemoryToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with rows
    pub fn with_rows(rows: impl IntoIterator<Item = ToolRow>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|r| (r.tool_no, r)).collect()),
        }
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Drop a row behind the adapter's back
    pub fn remove_row(&self, tool_no: i64) -> Option<ToolRow> {
        self.rows.write().remove(&tool_no)
    }
}

#[async_trait]
impl ToolStore for MemoryToolStore {
    async fn load_rows(&self) -> DbResult<Vec<ToolRow>> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn insert(&self, row: &ToolRow) -> DbResult<()> {
        let mut rows = self.rows.write();
        if rows.contains_key(&row.tool_no) {
            return Err(ReconciliationError::DuplicateInsert {
                tool_number: tool_number(row.tool_no),
            }
            .into());
        }
        rows.insert(row.tool_no, row.clone());
        Ok(())
    }

    async fn update(&self, row: &ToolRow) -> DbResult<()> {
        let mut rows = self.rows.write();
        match rows.get_mut(&row.tool_no) {
            Some(stored) => {
                *stored = row.clone();
                Ok(())
            }
            None => Err(ReconciliationError::MissingUpdateTarget {
                tool_number: tool_number(row.tool_no),
            }
            .into()),
        }
    }

    async fn delete(&self, tool_no: i64) -> DbResult<()> {
        match self.rows.write().remove(&tool_no) {
            Some(_) => Ok(()),
            None => Err(ReconciliationError::MissingDeleteTarget {
                tool_number: tool_number(tool_no),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use tooltable_core::ToolRecord;

    #[tokio::test]
    async fn test_out_of_range_tool_numbers_are_not_truncated() {
        let store = MemoryToolStore::new();
        let huge = i64::from(i32::MAX) + 5;

        let err = store.delete(huge).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Reconciliation(ReconciliationError::MissingDeleteTarget {
                tool_number: i32::MAX
            })
        ));

        let mut row = ToolRow::from_record(&ToolRecord::new_tool(1));
        row.tool_no = i64::from(i32::MIN) - 1;
        let err = store.update(&row).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Reconciliation(ReconciliationError::MissingUpdateTarget {
                tool_number: i32::MIN
            })
        ));
    }
}
