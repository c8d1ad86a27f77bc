//! Main entry point for the encoding-bench CLI

use clap::Parser;
use encoding_bench::cli::{Cli, Commands};
use encoding_bench::metrics::init_metrics;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing(debug: bool) {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_level = if debug { "encoding_bench=debug" } else { "encoding_bench=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only the results
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr).await {
            warn!("Metrics exporter unavailable: {}", e);
        }
    }

    // Execute command
    let result = match cli.command {
        Commands::Run(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
        Commands::Cleanup(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
    };

    // Handle result
    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
