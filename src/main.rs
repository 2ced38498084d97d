use clap::Parser;
use tooltable::cli::{run, Cli};
use tooltable::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;
    tracing::debug!(
        "tooltable {} (built {})",
        tooltable::VERSION,
        tooltable::BUILD_DATE
    );

    run(&cli).await
}
