//! # tooltable
//!
//! LinuxCNC tool table handling:
//! - `tool.tbl` text codec with header preservation
//! - Relational tool store with changeset reconciliation
//! - Service that watches the file, follows the machine controller and
//!   restores the remembered spindle tool after homing
//!
//! ## Architecture
//!
//! The workspace is split into crates:
//!
//! 1. **tooltable-core** - Tool records, the table, codec, changesets, errors
//! 2. **tooltable-db** - sqlx store and the relational adapter
//! 3. **tooltable-settings** - Configuration and persistent data
//! 4. **tooltable-service** - Service, events, file watcher, controller seam
//! 5. **tooltable** - Command line binary that integrates all crates

pub mod cli;

pub use tooltable_core::{
    codec, Changeset, Column, ColumnKind, ColumnSet, DecodedTable, Error, HeaderBlock,
    HeaderTemplate, ParseError, ReconciliationError, Result, ToolRecord, ToolTable, ToolValue,
    Update,
};
pub use tooltable_db::{DbError, MemoryToolStore, RelationalAdapter, SqliteToolStore, ToolStore};
pub use tooltable_service::{
    backend_from_config, DatabaseBackend, EventCategory, EventFilter, FileBackend,
    MachineController, MachineEvent, ServiceOptions, ServiceState, SimulatedController,
    TableBackend, ToolTableEvent, ToolTableEvents, ToolTableService,
};
pub use tooltable_settings::{Backend, PersistentData, SettingsError, ToolTableConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Log lines go to stderr so table output on stdout stays clean.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
