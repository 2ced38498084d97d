//! Error types for the settings crate.
//!
//! This module provides structured error types for configuration loading,
//! validation and the persistent data file.

use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A configuration value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The file extension does not name a supported format.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Reading or writing a settings file failed.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl SettingsError {
    /// Shorthand for an invalid setting
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<SettingsError> for tooltable_core::Error {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::IoError(e) => tooltable_core::Error::Persistence(e),
            other => tooltable_core::Error::Config(other.to_string()),
        }
    }
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
