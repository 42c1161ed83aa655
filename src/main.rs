//! Binary entry point for deep-research-rs.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use deep_research_rs::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::execute(cli).await?;
    Ok(())
}
