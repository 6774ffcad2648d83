//! Go-Live daemon
//!
//! `golived` hosts the go-live control plane behind a JSON admin API:
//! - readiness checks and the go-live verdict
//! - capability graph inspection and rollout simulation
//! - plan approval, execution and rollback
//! - audit log queries

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::{DaemonError, DaemonResult};
use server::Server;

/// Go-Live Daemon CLI
#[derive(Parser)]
#[command(name = "golived")]
#[command(about = "Go-Live control plane daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GOLIVE_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "GOLIVE_LISTEN_ADDR")]
    listen: Option<String>,

    /// Capability manifest, may be repeated; replaces configured manifests
    #[arg(short, long)]
    manifest: Vec<PathBuf>,

    /// Log level
    #[arg(long, env = "GOLIVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "GOLIVE_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if !cli.manifest.is_empty() {
        config.capabilities.manifests = cli.manifest;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        enabled = config.enabled,
        listen = %config.server.listen_addr,
        "Starting golived"
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await
}
