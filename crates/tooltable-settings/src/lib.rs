//! # Tool Table Settings
//!
//! Configuration file handling and the persistent key/value data kept
//! across restarts.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    default_config_dir, default_config_path, Backend, ToolTableConfig, DEFAULT_HEADER_TEMPLATE,
};
pub use error::{SettingsError, SettingsResult};
pub use persistence::{PersistentData, TOOL_IN_SPINDLE_KEY};
