//! Persistent data
//!
//! Small key/value store kept in a JSON file across restarts, e.g. the
//! tool that was in the spindle at shutdown.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SettingsResult;

/// Key holding the tool number in the spindle at shutdown
pub const TOOL_IN_SPINDLE_KEY: &str = "tool-in-spindle";

/// JSON backed key/value store
#[derive(Debug)]
pub struct PersistentData {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl PersistentData {
    /// Open the data file. A missing file starts empty; an unreadable one
    /// is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match Self::read(&path) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable persistent data {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    /// Empty store that is never written until [`PersistentData::save`]
    pub fn in_memory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(path: &Path) -> SettingsResult<BTreeMap<String, Value>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value for `key`, or `default` when missing or of another type
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.values
            .read()
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }

    /// Set a value in memory
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SettingsResult<()> {
        let value = serde_json::to_value(value)?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Write all values to the backing file
    pub fn save(&self) -> SettingsResult<()> {
        let content = serde_json::to_string_pretty(&*self.values.read())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        tracing::debug!("Saved persistent data to {}", self.path.display());
        Ok(())
    }

    /// Remembered spindle tool, `0` when none
    pub fn tool_in_spindle(&self) -> i32 {
        self.get(TOOL_IN_SPINDLE_KEY, 0)
    }

    pub fn set_tool_in_spindle(&self, tool_number: i32) -> SettingsResult<()> {
        self.set(TOOL_IN_SPINDLE_KEY, tool_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let data = PersistentData::open(dir.path().join("data.json"));
        assert_eq!(data.tool_in_spindle(), 0);
        assert_eq!(data.get("anything", 7u32), 7);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("data.json");

        let data = PersistentData::open(&path);
        data.set_tool_in_spindle(12).unwrap();
        data.set("operator", "sam").unwrap();
        data.save().unwrap();

        let reopened = PersistentData::open(&path);
        assert_eq!(reopened.tool_in_spindle(), 12);
        assert_eq!(reopened.get("operator", String::new()), "sam");
    }

    #[test]
    fn test_wrong_type_uses_default() {
        let data = PersistentData::in_memory("unused.json");
        data.set(TOOL_IN_SPINDLE_KEY, "not a number").unwrap();
        assert_eq!(data.tool_in_spindle(), 0);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let data = PersistentData::open(&path);
        assert_eq!(data.tool_in_spindle(), 0);
    }
}
