//! Table backends
//!
//! A backend loads the table from where it lives and persists a new one.
//! The service adds the sentinel; backends never need to.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tooltable_core::codec::{encode, read_table_file, render_header, write_table_file};
use tooltable_core::{ColumnSet, HeaderBlock, HeaderTemplate, Result, ToolTable};
use tooltable_db::{RelationalAdapter, SqliteToolStore};
use tooltable_settings::{Backend, ToolTableConfig};

/// Source and sink of the tool table
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Load the current table
    async fn load(&self) -> Result<ToolTable>;

    /// Persist a table. Columns only matter for text formats.
    async fn save(&self, table: &ToolTable, columns: &ColumnSet) -> Result<()>;

    /// File to watch for external changes, if any
    fn watch_path(&self) -> Option<&Path> {
        None
    }

    /// Short description for logs
    fn describe(&self) -> String;
}

/// `tool.tbl` flat file backend
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    header: Mutex<HeaderBlock>,
    template: Option<HeaderTemplate>,
    version: String,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header: Mutex::new(HeaderBlock::default()),
            template: None,
            version: tooltable_core::VERSION.to_string(),
        }
    }

    /// Generated header written on save
    pub fn with_template(mut self, template: Option<HeaderTemplate>) -> Self {
        self.template = template;
        self
    }

    /// Version string substituted into the header template
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// User header read by the last load
    pub fn header(&self) -> HeaderBlock {
        self.header.lock().clone()
    }
}

#[async_trait]
impl TableBackend for FileBackend {
    async fn load(&self) -> Result<ToolTable> {
        let decoded = read_table_file(&self.path)?;
        if !decoded.diagnostics.is_empty() {
            tracing::warn!(
                "{} malformed field(s) in {}",
                decoded.diagnostics.len(),
                self.path.display()
            );
        }
        *self.header.lock() = decoded.header;
        Ok(decoded.table)
    }

    async fn save(&self, table: &ToolTable, columns: &ColumnSet) -> Result<()> {
        let header = render_header(&self.header.lock(), self.template.as_ref(), &self.version);
        let text = encode(table, columns, &header);
        write_table_file(&self.path, &text)?;
        tracing::info!(
            "Saved {} tools to {}",
            table.tools().count(),
            self.path.display()
        );
        Ok(())
    }

    fn watch_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Relational store backend
#[derive(Debug)]
pub struct DatabaseBackend {
    adapter: RelationalAdapter,
    label: String,
}

impl DatabaseBackend {
    pub fn new(adapter: RelationalAdapter, label: impl Into<String>) -> Self {
        Self {
            adapter,
            label: label.into(),
        }
    }

    pub fn adapter(&self) -> &RelationalAdapter {
        &self.adapter
    }
}

#[async_trait]
impl TableBackend for DatabaseBackend {
    async fn load(&self) -> Result<ToolTable> {
        Ok(self.adapter.load().await?)
    }

    async fn save(&self, table: &ToolTable, _columns: &ColumnSet) -> Result<()> {
        let changes = self.adapter.save(table).await?;
        tracing::info!("Saved tool table to {}: {}", self.label, changes);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("database {}", self.label)
    }
}

/// Build the backend selected by the configuration
pub async fn backend_from_config(config: &ToolTableConfig) -> Result<Arc<dyn TableBackend>> {
    let backend: Arc<dyn TableBackend> = match &config.backend {
        Backend::File => Arc::new(
            FileBackend::new(&config.tool_table_file).with_template(config.header_template()),
        ),
        Backend::Database { url } => {
            let store = SqliteToolStore::connect(url).await?;
            let adapter = RelationalAdapter::new(Arc::new(store));
            Arc::new(DatabaseBackend::new(adapter, url.clone()))
        }
    };
    tracing::debug!("Using {} backend", backend.describe());
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tooltable_core::ToolRecord;
    use tooltable_db::MemoryToolStore;

    #[tokio::test]
    async fn test_file_backend_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.tbl");
        std::fs::write(&path, "Shop notes\n\n;Tool\nT1 P1 Z0.5 ;probe\n").unwrap();

        let backend = FileBackend::new(&path)
            .with_template(Some(HeaderTemplate::new("Title\n---\nby {version}\n")))
            .with_version("1.0");
        let mut table = backend.load().await.unwrap();
        assert_eq!(backend.header().lines(), ["Shop notes", ""]);

        table.insert(ToolRecord::new_tool(2));
        backend
            .save(&table, &ColumnSet::parse("TPZR").unwrap())
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Shop notes\n\n---\nby 1.0\n\n;Tool"));
        assert!(text.contains("T2     P2     Z+0.000000   ; New Tool"));
    }

    #[tokio::test]
    async fn test_file_backend_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("absent.tbl"));
        let err = backend.load().await.unwrap_err();
        assert!(err.is_source_unavailable());
        assert!(backend.watch_path().is_some());
    }

    #[tokio::test]
    async fn test_database_backend() {
        let adapter = RelationalAdapter::new(Arc::new(MemoryToolStore::new()));
        let backend = DatabaseBackend::new(adapter, "memory");

        let mut table = ToolTable::with_sentinel();
        table.insert(ToolRecord::new_tool(5));
        backend.save(&table, &ColumnSet::all()).await.unwrap();

        let loaded = backend.load().await.unwrap();
        assert_eq!(loaded.tool_numbers().collect::<Vec<_>>(), vec![5]);
        assert!(backend.watch_path().is_none());
    }
}
