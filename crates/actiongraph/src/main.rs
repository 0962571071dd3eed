//! Actiongraph CLI binary.

use anyhow::Result;
use actiongraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Single-threaded runtime: every command is a short run of sequential file I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=actiongraph=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("actiongraph=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Actiongraph CLI completed successfully");
    Ok(())
}
