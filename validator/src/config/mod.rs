//! Configuration Management Module
//!
//! This module handles loading and validating configuration for the bridge
//! validator. Configuration lives in a single YAML file whose path is the
//! binary's one positional argument.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default bound on the block span of a single `eth_getLogs` call, chosen to
/// stay within typical EVM node log-query limits.
pub const DEFAULT_MAX_QUERY_BLOCKS: u64 = 100_000;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all validator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Document store connection settings
    pub mongodb: MongoConfig,
    /// Pocket chain settings (vault side)
    pub pocket: PocketConfig,
    /// EVM chain settings (wPOKT side)
    pub ethereum: EthereumConfig,
    /// Per-service enable flags and tick intervals
    pub mint_monitor: ServiceConfig,
    pub mint_signer: ServiceConfig,
    pub mint_executor: ServiceConfig,
    pub burn_monitor: ServiceConfig,
    pub burn_signer: ServiceConfig,
    pub burn_executor: ServiceConfig,
    /// Logging settings
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Document store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection string
    pub uri: String,
    /// Database name
    pub database: String,
    /// Connection/operation timeout in milliseconds
    #[serde(default = "default_mongo_timeout_millis")]
    pub timeout_millis: u64,
}

/// Pocket chain settings.
///
/// `mnemonic` and `gcp_kms_key_name` select the signer variant; exactly one
/// of `mnemonic`, `gcp_kms_key_name`, or `private_key` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PocketConfig {
    /// RPC endpoint of the Pocket node
    pub rpc_url: String,
    /// Per-request RPC timeout in milliseconds
    pub rpc_timeout_millis: u64,
    /// Chain id the node must serve
    pub chain_id: String,
    /// First height the mint monitor sweeps when no health record exists
    #[serde(default)]
    pub start_height: i64,
    /// Confirmations required before a deposit is acted upon
    #[serde(default)]
    pub confirmations: i64,
    /// Fixed transaction fee in upokt, deducted from return transfers
    pub tx_fee: u64,
    /// Expected vault (multisig) address; cross-checked against the address
    /// derived from `multisig_public_keys` when set
    #[serde(default)]
    pub vault_address: String,
    /// Compressed secp256k1 public keys of all validators, hex encoded
    pub multisig_public_keys: Vec<String>,
    /// Signature threshold of the vault multisig
    pub multisig_threshold: u32,
    /// Raw secp256k1 private key, hex encoded
    #[serde(default)]
    pub private_key: String,
    /// BIP-39 mnemonic backing the local signer
    #[serde(default)]
    pub mnemonic: String,
    /// Resource name of a Cloud KMS secp256k1 key backing the remote signer
    #[serde(default)]
    pub gcp_kms_key_name: String,
    /// Bech32 human-readable prefix of Pocket account addresses
    pub bech32_prefix: String,
    /// Denomination of the native coin on the wire
    #[serde(default = "default_coin_denom")]
    pub coin_denom: String,
}

/// EVM chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumConfig {
    /// RPC endpoint of the EVM node
    pub rpc_url: String,
    /// Per-request RPC timeout in seconds
    pub rpc_timeout_secs: u64,
    /// Chain id the node must serve
    pub chain_id: u64,
    /// First block the burn/mint monitors sweep when no health record exists
    #[serde(default)]
    pub start_block_number: i64,
    /// Confirmations required before a burn is acted upon
    #[serde(default)]
    pub confirmations: i64,
    /// Address of the wrapped POKT token contract
    pub wrapped_pocket_address: String,
    /// Address of the mint controller contract (EIP-712 verifying contract)
    pub mint_controller_address: String,
    /// EVM addresses of all validators; bounds the mint signature set
    #[serde(default)]
    pub validator_addresses: Vec<String>,
    /// Upper bound on the block span of one log query
    #[serde(default = "default_max_query_blocks")]
    pub max_query_blocks: u64,
}

/// Enable flag and tick interval of one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Log level filter (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_mongo_timeout_millis() -> u64 {
    10_000
}

fn default_coin_denom() -> String {
    "upokt".to_string()
}

fn default_max_query_blocks() -> u64 {
    DEFAULT_MAX_QUERY_BLOCKS
}

// ============================================================================
// CONFIGURATION LOADING AND VALIDATION
// ============================================================================

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field requirements the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        let key_sources = [
            !self.pocket.mnemonic.is_empty(),
            !self.pocket.gcp_kms_key_name.is_empty(),
            !self.pocket.private_key.is_empty(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if key_sources != 1 {
            anyhow::bail!(
                "exactly one of pocket.mnemonic, pocket.gcp_kms_key_name, pocket.private_key must be set"
            );
        }

        if self.pocket.multisig_public_keys.is_empty() {
            anyhow::bail!("pocket.multisig_public_keys must not be empty");
        }
        if self.pocket.multisig_threshold == 0
            || self.pocket.multisig_threshold as usize > self.pocket.multisig_public_keys.len()
        {
            anyhow::bail!(
                "pocket.multisig_threshold must be between 1 and the number of multisig public keys"
            );
        }
        if self.ethereum.max_query_blocks == 0 {
            anyhow::bail!("ethereum.max_query_blocks must be positive");
        }
        Ok(())
    }

    /// Number of validators whose signatures complete a mint.
    pub fn mint_signer_count(&self) -> usize {
        if self.ethereum.validator_addresses.is_empty() {
            self.pocket.multisig_public_keys.len()
        } else {
            self.ethereum.validator_addresses.len()
        }
    }
}
