//! kvd - replicated key-value store node.

use anyhow::{Context, Result};
use clap::Parser;
use kvd_server::NodeConfig;
use kvd_server::observability::{LogFormat, TracingConfig, TracingGuard, init_tracing};
use std::path::PathBuf;
use tracing::Instrument;

/// Replicated key-value store node.
#[derive(Parser)]
#[command(name = "kvd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the node configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbosity: u8, config: &NodeConfig) -> Result<TracingGuard> {
    // Explicit -v wins, then the environment, then the config file.
    let log_filter = match verbosity {
        0 => std::env::var("RUST_LOG")
            .or_else(|_| std::env::var("KVD_LOG_LEVEL"))
            .ok()
            .or_else(|| config.log_level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let log_format = std::env::var("KVD_LOG_FORMAT")
        .ok()
        .or_else(|| config.log_format.clone())
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or_else(LogFormat::detect);

    let config = TracingConfig::builder()
        .service_name(&config.name)
        .log_format(log_format)
        .log_filter(log_filter)
        .build();

    init_tracing(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let tracing_guard = setup_logging(cli.verbose, &config)?;

    let span = tracing::info_span!("kvd", node = %tracing_guard.service_name());
    kvd_server::run(config).instrument(span).await
}
