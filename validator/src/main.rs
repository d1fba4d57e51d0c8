//! Validator entrypoint: `pokt-validator <config.yaml>`.
//!
//! Loads configuration, validates both chain networks (fatal on mismatch),
//! spawns every enabled service, and shuts them down gracefully on SIGINT
//! or SIGTERM. Services interrupt their interval sleep immediately but
//! always finish the in-flight sweep.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pokt_validator::config::Config;
use pokt_validator::service;
use pokt_validator::storage::Database;

#[derive(Parser)]
#[command(name = "pokt-validator", about = "wPOKT bridge validator")]
struct Cli {
    /// Path to the YAML configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let filter = EnvFilter::try_new(&config.logger.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = %cli.config.display(), "Config loaded");

    let db = Database::connect(&config.mongodb)
        .await
        .context("Failed to connect to MongoDB")?;
    db.setup_indexes()
        .await
        .context("Failed to set up indexes")?;
    info!("Database initialized");

    // Both network validations are process-fatal on mismatch
    service::pocket_client(&config)?
        .validate_network()
        .await
        .context("Pocket network validation failed")?;
    service::evm_client(&config)?
        .validate_network()
        .await
        .context("EVM network validation failed")?;

    let handles = service::spawn_services(&config, &db).await?;

    wait_for_shutdown_signal().await?;
    info!("Stopping services gracefully");

    for handle in handles {
        handle.stop().await;
    }
    info!("Validator stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            info!("Caught SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Caught SIGTERM");
        }
    }
    Ok(())
}
