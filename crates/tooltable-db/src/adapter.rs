//! Relational table adapter
//!
//! Loads a [`ToolTable`] from a [`ToolStore`] and writes a desired table
//! back by computing and applying a [`Changeset`].

use std::sync::Arc;

use tooltable_core::{Changeset, ToolRecord, ToolTable};

use crate::error::{DbError, DbResult};
use crate::model::ToolRow;
use crate::traits::ToolStore;

/// Reconciles tool tables against a relational store
#[derive(Clone)]
pub struct RelationalAdapter {
    store: Arc<dyn ToolStore>,
}

impl RelationalAdapter {
    pub fn new(store: Arc<dyn ToolStore>) -> Self {
        Self { store }
    }

    /// The store this adapter writes to
    pub fn store(&self) -> &Arc<dyn ToolStore> {
        &self.store
    }

    /// Load every stored tool. The result never holds the sentinel.
    pub async fn load(&self) -> DbResult<ToolTable> {
        let rows = self.store.load_rows().await?;
        let mut table = ToolTable::new();
        for row in rows {
            let tool = ToolRecord::try_from(row)?;
            if tool.is_no_tool() {
                tracing::warn!("Ignoring stored row for the reserved tool number 0");
                continue;
            }
            table.insert(tool);
        }
        tracing::debug!("Loaded {} tools from the store", table.len());
        Ok(table)
    }

    /// Changes that turn `persisted` into `desired`.
    ///
    /// Fields the store cannot hold are ignored so they never show up as
    /// updates.
    pub fn diff(persisted: &ToolTable, desired: &ToolTable) -> Changeset {
        let storable: ToolTable = desired.iter().map(ToolRow::stored_view).collect();
        Changeset::between(persisted, &storable)
    }

    /// Apply a changeset: inserts, then updates, then deletes.
    ///
    /// Every row is committed on its own. The first failure stops the run
    /// and is returned; rows written before it stay written.
    pub async fn apply(&self, changes: &Changeset) -> DbResult<usize> {
        let mut applied = 0;

        let result = async {
            for tool in changes.inserted.values() {
                self.store.insert(&ToolRow::from_record(tool)).await?;
                tracing::debug!("Inserted tool {}", tool.tool_number);
                applied += 1;
            }
            for update in changes.updated.values() {
                self.store.update(&ToolRow::from_record(&update.new)).await?;
                tracing::debug!("Updated tool {}", update.new.tool_number);
                applied += 1;
            }
            for tool in changes.deleted.values() {
                self.store.delete(i64::from(tool.tool_number)).await?;
                tracing::debug!("Deleted tool {}", tool.tool_number);
                applied += 1;
            }
            Ok::<(), DbError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("Applied tool changes: {}", changes);
                Ok(applied)
            }
            Err(e) => {
                tracing::error!(
                    "Tool store reconciliation stopped after {} of {} changes: {}",
                    applied,
                    changes.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Load the persisted state, diff it against `desired` and apply
    pub async fn save(&self, desired: &ToolTable) -> DbResult<Changeset> {
        let persisted = self.load().await?;
        let changes = Self::diff(&persisted, desired);
        if changes.is_empty() {
            tracing::debug!("Tool store already up to date");
            return Ok(changes);
        }
        self.apply(&changes).await?;
        Ok(changes)
    }
}

impl std::fmt::Debug for RelationalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalAdapter").finish_non_exhaustive()
    }
}
