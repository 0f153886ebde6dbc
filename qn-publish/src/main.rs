use anyhow::Result;
use clap::Parser;
use qn_publish::cli::{run, Cli};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Warnings only, except progress lines which CI logs need to show.
const DEFAULT_FILTER: &str = "warn,qn_publish_core::progress=info";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean for dry-run output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
