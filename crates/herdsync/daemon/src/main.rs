//! Herdsync Daemon - livestock twin inference and sync
//!
//! The daemon provides:
//! - Periodic classification of twin attributes and label write-back
//! - Alerts on abnormal labels
//! - A read API for twin records

use clap::Parser;
use herdsync_daemon::error::{DaemonError, DaemonResult};
use herdsync_daemon::{DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Herdsync Daemon CLI
#[derive(Parser)]
#[command(name = "herdsyncd")]
#[command(about = "Herdsync Daemon - livestock twin inference and sync", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HERDSYNC_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides server.listen_addr)
    #[arg(short, long, env = "HERDSYNC_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides logging.level)
    #[arg(long, env = "HERDSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HERDSYNC_LOG_JSON")]
    json: bool,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("invalid listen address: {}", e)))?;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
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
        twins = config.sync.twin_ids.len(),
        model = %config.model.artifact_path.display(),
        "Starting herdsync daemon"
    );

    let server = Server::new(config).await?;
    if cli.once {
        server.run_once().await?;
        Ok(())
    } else {
        server.run().await
    }
}
