use anyhow::{Context, Result};
use clap::Parser;
use pandora_api::Server;
use pandora_core::{ConfigManager, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "pandora_api=info,pandora_ai=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(name = "pandora-server", version, about = "AI code analysis HTTP service")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Model backend: local, gemini or ollama
    #[arg(short, long)]
    backend: Option<String>,

    /// Enable debug logging for Pandora crates
    #[arg(short, long)]
    verbose: bool,
}

/// Expand a bare level such as "debug" into per-crate directives
fn level_directives(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!(
            "pandora_api={0},pandora_ai={0},pandora_core={0},tower_http={0}",
            level
        )
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(level_directives("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level_directives(&logging.level)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
        "full" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let mut config = manager.config().clone();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(backend) = cli.backend {
        config.backend.kind = backend.to_lowercase();
    }
    let manager = ConfigManager::from_config(config).context("Invalid command-line override")?;

    init_tracing(&manager.config().logging, cli.verbose);

    let server = Server::new(Arc::new(manager.config().clone()))
        .await
        .context("Failed to start server")?;
    server.run().await?;

    Ok(())
}
