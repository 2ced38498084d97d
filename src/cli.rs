//! Command line interface

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use tooltable_core::codec::{encode, read_table_file};
use tooltable_db::{RelationalAdapter, SqliteToolStore};
use tooltable_service::{
    backend_from_config, EventFilter, FileBackend, SimulatedController, TableBackend,
    ToolTableService,
};
use tooltable_settings::{default_config_path, Backend, ToolTableConfig};

/// LinuxCNC tool table utility
#[derive(Parser, Debug)]
#[command(name = "tooltable")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (JSON or TOML)
    ///
    /// Defaults to `config.toml` in the user configuration directory.
    #[arg(long, short, global = true, env = "TOOLTABLE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Tool table file, overriding the configuration
    #[arg(long, short, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Database URL, selects the database backend
    ///
    /// Example: --url sqlite://tools.db
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Columns to write (comma-separated)
    ///
    /// Example: --columns T,P,D,Z,R
    #[arg(long, global = true, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the tool table
    Show,
    /// Rewrite the tool table file in canonical layout
    Normalize,
    /// Run the tool table service until interrupted, logging its events
    Watch,
    /// Copy the tool table file into a database
    ImportDb {
        /// Target database URL
        #[arg(value_name = "URL")]
        target: String,
    },
}

impl Cli {
    /// Load the configuration and apply command line overrides
    pub fn load_config(&self) -> anyhow::Result<ToolTableConfig> {
        let mut config = match &self.config {
            Some(path) => ToolTableConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ToolTableConfig::load_or_default(&default_config_path())
                .context("Failed to load default config")?,
        };

        if let Some(file) = &self.file {
            config.tool_table_file = file.clone();
        }
        if let Some(url) = &self.url {
            config.backend = Backend::Database { url: url.clone() };
        }
        if let Some(columns) = &self.columns {
            config.columns = columns.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the selected command
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    match &cli.command {
        Commands::Show => show(&config).await,
        Commands::Normalize => normalize(&config).await,
        Commands::Watch => watch(&config).await,
        Commands::ImportDb { target } => import_db(&config, target).await,
    }
}

async fn show(config: &ToolTableConfig) -> anyhow::Result<()> {
    let backend = backend_from_config(config).await?;
    let table = backend
        .load()
        .await
        .with_context(|| format!("Failed to load {}", backend.describe()))?;
    print!("{}", encode(&table, &config.column_set(), &[]));
    Ok(())
}

async fn normalize(config: &ToolTableConfig) -> anyhow::Result<()> {
    if config.backend != Backend::File {
        bail!("normalize only applies to the file backend");
    }
    let backend = FileBackend::new(&config.tool_table_file)
        .with_template(config.header_template())
        .with_version(crate::VERSION);
    let table = backend.load().await?;
    backend.save(&table, &config.column_set()).await?;
    println!(
        "Rewrote {} with {} tools",
        config.tool_table_file.display(),
        table.tools().count()
    );
    Ok(())
}

async fn watch(config: &ToolTableConfig) -> anyhow::Result<()> {
    let controller = Arc::new(SimulatedController::new());
    let service = ToolTableService::from_config(config, controller).await?;
    service.events().on(EventFilter::All, |event| {
        tracing::info!("{}", event);
    });

    service.initialise().await;
    tracing::info!("Watching tool table, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    service.terminate().await?;
    Ok(())
}

async fn import_db(config: &ToolTableConfig, target: &str) -> anyhow::Result<()> {
    let decoded = read_table_file(&config.tool_table_file)
        .with_context(|| format!("Failed to read {}", config.tool_table_file.display()))?;
    for diagnostic in &decoded.diagnostics {
        tracing::warn!("{}", diagnostic);
    }

    let store = SqliteToolStore::connect(target).await?;
    let adapter = RelationalAdapter::new(Arc::new(store));
    let changes = adapter.save(&decoded.table).await?;
    println!("Imported into {}: {}", target, changes);
    Ok(())
}
