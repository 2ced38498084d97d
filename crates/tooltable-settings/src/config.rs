//! Tool table configuration
//!
//! Supports JSON and TOML files, picked by extension. The default location
//! is `tooltable/config.toml` under the platform config directory.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tooltable_core::{ColumnSet, HeaderTemplate, VERSION};

use crate::error::{SettingsError, SettingsResult};

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "tooltable";

/// Default header template for rewritten tool table files
pub const DEFAULT_HEADER_TEMPLATE: &str = "\
LinuxCNC Tool Table
-------------------

---
Generated by: tooltable ({version})
Generated on: {datetime}
";

/// Where the tool table lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backend {
    /// The `tool.tbl` flat file
    File,
    /// A relational store
    Database {
        /// sqlx connection URL, e.g. `sqlite://tools.db`
        url: String,
    },
}

impl Default for Backend {
    fn default() -> Self {
        Self::File
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Database { url } => write!(f, "database ({})", url),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnsField {
    Letters(String),
    Ids(Vec<String>),
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match ColumnsField::deserialize(deserializer)? {
        ColumnsField::Letters(letters) => letters
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_string())
            .collect(),
        ColumnsField::Ids(ids) => ids,
    })
}

/// Tool table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolTableConfig {
    /// Path of the `tool.tbl` file
    pub tool_table_file: PathBuf,
    /// Column identifiers written to the file, e.g. `["T", "P", "Z", "R"]`.
    /// A string of letters such as `"PTDZR"` is accepted when loading.
    #[serde(deserialize_with = "deserialize_columns")]
    pub columns: Vec<String>,
    /// Generated header lines; empty disables the generated header
    pub file_header_template: String,
    /// Reload the last tool into the spindle after homing
    pub remember_tool_in_spindle: bool,
    /// Quiet period before reloading a changed file
    pub file_change_debounce_ms: u64,
    /// Delay between homing and the tool reload command
    pub tool_reload_delay_ms: u64,
    /// Key/value file for data kept across restarts
    pub persistent_data_file: PathBuf,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Table backend
    pub backend: Backend,
}

impl Default for ToolTableConfig {
    fn default() -> Self {
        let dir = default_config_dir();
        Self {
            tool_table_file: PathBuf::from("tool.tbl"),
            columns: ColumnSet::all().iter().map(|c| c.id().to_string()).collect(),
            file_header_template: DEFAULT_HEADER_TEMPLATE.to_string(),
            remember_tool_in_spindle: true,
            file_change_debounce_ms: 50,
            tool_reload_delay_ms: 200,
            persistent_data_file: dir.join("persistent_data.json"),
            event_capacity: 64,
            backend: Backend::File,
        }
    }
}

impl ToolTableConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match extension(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded tool table config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> SettingsResult<()> {
        if self.tool_table_file.as_os_str().is_empty() {
            return Err(SettingsError::invalid("tool_table_file", "must not be empty"));
        }

        if let Backend::Database { url } = &self.backend {
            if url.trim().is_empty() {
                return Err(SettingsError::invalid("backend.url", "must not be empty"));
            }
        }

        if self.event_capacity == 0 {
            return Err(SettingsError::invalid("event_capacity", "must be > 0"));
        }

        if let Some(template) = self.header_template() {
            template
                .render(VERSION, &Local::now())
                .map_err(|e| SettingsError::invalid("file_header_template", e.to_string()))?;
        }

        Ok(())
    }

    /// Configured columns, or every column when none of them is valid
    pub fn column_set(&self) -> ColumnSet {
        ColumnSet::from_ids(&self.columns).unwrap_or_else(|| {
            if !self.columns.is_empty() {
                tracing::warn!(
                    "No valid tool table columns in {:?}, using all columns",
                    self.columns
                );
            }
            ColumnSet::all()
        })
    }

    /// Header template, `None` when disabled
    pub fn header_template(&self) -> Option<HeaderTemplate> {
        if self.file_header_template.trim().is_empty() {
            None
        } else {
            Some(HeaderTemplate::new(self.file_header_template.clone()))
        }
    }

    pub fn file_change_debounce(&self) -> Duration {
        Duration::from_millis(self.file_change_debounce_ms)
    }

    pub fn tool_reload_delay(&self) -> Duration {
        Duration::from_millis(self.tool_reload_delay_ms)
    }
}

enum Format {
    Json,
    Toml,
}

fn extension(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// `tooltable` directory under the platform config directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Default config file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}
