//! Services Module
//!
//! The six cooperating services and the factory that wires them up from
//! configuration. Each enabled service runs as an independent periodic
//! worker; monitors resume their chain cursor from the last persisted
//! health record, falling back to the configured start value, falling back
//! to the current chain tip.

use std::time::Duration;

use anyhow::{Context, Result};
use chain_clients_evm::EvmClient;
use chain_clients_pocket::PocketClient;
use tracing::{info, warn};

use crate::config::Config;
use crate::cosmos::{bech32_from_bytes, MultisigKey};
use crate::signer::ValidatorSigner;
use crate::storage::Database;

pub mod burn_executor;
pub mod burn_monitor;
pub mod burn_signer;
pub mod mint_executor;
pub mod mint_monitor;
pub mod mint_signer;
pub mod runner;
pub mod util;

pub use burn_executor::{BurnExecutor, BURN_EXECUTOR_NAME};
pub use burn_monitor::{BurnMonitor, BURN_MONITOR_NAME};
pub use burn_signer::{BurnSigner, BURN_SIGNER_NAME};
pub use mint_executor::{MintExecutor, MINT_EXECUTOR_NAME};
pub use mint_monitor::{MintMonitor, MINT_MONITOR_NAME};
pub use mint_signer::{MintSigner, MINT_SIGNER_NAME};
pub use runner::{find_last_health, spawn, Service, ServiceHandle};

/// Builds the Pocket client from configuration.
pub fn pocket_client(config: &Config) -> Result<PocketClient> {
    PocketClient::new(
        &config.pocket.rpc_url,
        &config.pocket.chain_id,
        Duration::from_millis(config.pocket.rpc_timeout_millis),
    )
}

/// Builds the EVM client from configuration.
pub fn evm_client(config: &Config) -> Result<EvmClient> {
    EvmClient::new(
        &config.ethereum.rpc_url,
        config.ethereum.chain_id,
        Duration::from_secs(config.ethereum.rpc_timeout_secs),
    )
}

/// Derives the vault multisig and its bech32 address, cross-checking the
/// configured vault address when present.
pub fn vault_from_config(config: &Config) -> Result<(MultisigKey, String)> {
    let multisig = MultisigKey::from_hex_keys(
        &config.pocket.multisig_public_keys,
        config.pocket.multisig_threshold,
    )
    .context("Invalid multisig configuration")?;
    let vault_address = bech32_from_bytes(&config.pocket.bech32_prefix, &multisig.address())?;

    if !config.pocket.vault_address.is_empty()
        && !config
            .pocket
            .vault_address
            .eq_ignore_ascii_case(&vault_address)
    {
        anyhow::bail!(
            "Configured vault address {} does not match derived multisig address {}",
            config.pocket.vault_address,
            vault_address
        );
    }
    Ok((multisig, vault_address))
}

/// Pocket start height for a monitor: last health, else configuration, else
/// the current chain tip.
async fn resume_pocket_height(
    db: &Database,
    name: &str,
    configured: i64,
    client: &PocketClient,
) -> i64 {
    let resumed = find_last_health(db, name)
        .await
        .and_then(|health| health.pokt_height.parse::<i64>().ok())
        .filter(|height| *height > 0);

    if let Some(height) = resumed {
        info!(service = name, height, "Resuming from last health");
        return height;
    }
    if configured > 0 {
        return configured;
    }
    match client.get_height().await {
        Ok(res) => res.height,
        Err(err) => {
            warn!(service = name, ?err, "Failed to fetch current height, starting from 0");
            0
        }
    }
}

/// EVM start block for a monitor, same precedence as the Pocket variant.
async fn resume_eth_block(db: &Database, name: &str, configured: i64, client: &EvmClient) -> i64 {
    let resumed = find_last_health(db, name)
        .await
        .and_then(|health| health.eth_block_number.parse::<i64>().ok())
        .filter(|block| *block > 0);

    if let Some(block) = resumed {
        info!(service = name, block, "Resuming from last health");
        return block;
    }
    if configured > 0 {
        return configured;
    }
    match client.get_block_number().await {
        Ok(block) => block as i64,
        Err(err) => {
            warn!(service = name, ?err, "Failed to fetch current block, starting from 0");
            0
        }
    }
}

/// Constructs and spawns every enabled service, returning their stop
/// handles. Signer construction failures are fatal.
pub async fn spawn_services(config: &Config, db: &Database) -> Result<Vec<ServiceHandle>> {
    let (multisig, vault_address) = vault_from_config(config)?;
    info!(vault = %vault_address, "Vault multisig address");

    let mut handles = Vec::new();

    if config.mint_monitor.enabled {
        let client = pocket_client(config)?;
        let start_height = resume_pocket_height(
            db,
            MINT_MONITOR_NAME,
            config.pocket.start_height,
            &client,
        )
        .await;
        let service = MintMonitor::new(
            db.clone(),
            client,
            config,
            vault_address.clone(),
            start_height,
        );
        handles.push(spawn(
            service,
            Duration::from_secs(config.mint_monitor.interval_secs),
            db.clone(),
        ));
    }

    if config.burn_monitor.enabled {
        let client = evm_client(config)?;
        let start_block = resume_eth_block(
            db,
            BURN_MONITOR_NAME,
            config.ethereum.start_block_number,
            &client,
        )
        .await;
        let service = BurnMonitor::new(db.clone(), client, config, start_block);
        handles.push(spawn(
            service,
            Duration::from_secs(config.burn_monitor.interval_secs),
            db.clone(),
        ));
    }

    if config.burn_signer.enabled {
        let signer = ValidatorSigner::from_config(&config.pocket)
            .await
            .context("Failed to construct burn signer key")?;
        let service = BurnSigner::new(
            db.clone(),
            pocket_client(config)?,
            evm_client(config)?,
            signer,
            multisig.clone(),
            config,
            vault_address.clone(),
        );
        handles.push(spawn(
            service,
            Duration::from_secs(config.burn_signer.interval_secs),
            db.clone(),
        ));
    }

    if config.burn_executor.enabled {
        let service = BurnExecutor::new(
            db.clone(),
            pocket_client(config)?,
            config,
            vault_address.clone(),
        );
        handles.push(spawn(
            service,
            Duration::from_secs(config.burn_executor.interval_secs),
            db.clone(),
        ));
    }

    if config.mint_signer.enabled {
        let signer = ValidatorSigner::from_config(&config.pocket)
            .await
            .context("Failed to construct mint signer key")?;
        let service = MintSigner::new(
            db.clone(),
            pocket_client(config)?,
            evm_client(config)?,
            signer,
            config,
            vault_address.clone(),
        )?;
        handles.push(spawn(
            service,
            Duration::from_secs(config.mint_signer.interval_secs),
            db.clone(),
        ));
    }

    if config.mint_executor.enabled {
        let client = evm_client(config)?;
        let start_block = resume_eth_block(
            db,
            MINT_EXECUTOR_NAME,
            config.ethereum.start_block_number,
            &client,
        )
        .await;
        let service = MintExecutor::new(
            db.clone(),
            client,
            config,
            vault_address.clone(),
            start_block,
        );
        handles.push(spawn(
            service,
            Duration::from_secs(config.mint_executor.interval_secs),
            db.clone(),
        ));
    }

    info!(count = handles.len(), "Spawned services");
    Ok(handles)
}
