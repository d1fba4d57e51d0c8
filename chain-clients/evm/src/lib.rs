//! EVM Client Module
//!
//! This module provides a client for communicating with the EVM chain that
//! hosts the wrapped POKT token, via its JSON-RPC API. It handles block and
//! transaction queries, log filtering with typed event decoding, and
//! read-only contract calls.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod events;

pub use events::{BurnAndBridgeEvent, EventIterator, EvmLog, MintedEvent, TransferEvent};

// ============================================================================
// API RESPONSE STRUCTURES
// ============================================================================

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// EVM transaction details from `eth_getTransactionByHash`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmTransaction {
    /// Transaction hash
    pub hash: String,
    /// Block number (hex string, `None` while pending)
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
    /// From address (sender)
    pub from: String,
    /// To address (recipient/contract)
    pub to: Option<String>,
    /// Transaction data (calldata)
    pub input: String,
    /// Transaction value (in wei, hex string)
    pub value: String,
}

// ============================================================================
// EVM CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with an EVM node via JSON-RPC.
///
/// Every request carries the timeout configured at construction. The client
/// holds no chain state; callers own start/current block bookkeeping.
#[derive(Debug, Clone)]
pub struct EvmClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the EVM node (e.g., "http://127.0.0.1:8545")
    base_url: String,
    /// Chain id the node is expected to serve
    expected_chain_id: u64,
}

impl EvmClient {
    /// Creates a new EVM client for the given node URL.
    ///
    /// # Arguments
    ///
    /// * `node_url` - Base URL of the EVM node
    /// * `expected_chain_id` - Chain id the node must report in `validate_network`
    /// * `timeout` - Per-request RPC timeout
    pub fn new(node_url: &str, expected_chain_id: u64, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: node_url.to_string(),
            expected_chain_id,
        })
    }

    /// Sends a single JSON-RPC request and unwraps the `result` field.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, self.base_url))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response from {}", method, self.base_url))?;

        if let Some(error) = response.error {
            return Err(anyhow::anyhow!(
                "JSON-RPC error from {}: {} (code: {})",
                self.base_url,
                error.message,
                error.code
            ));
        }

        Ok(response.result)
    }

    /// Gets the current block number via `eth_blockNumber`.
    pub async fn get_block_number(&self) -> Result<u64> {
        let result: String = self
            .call("eth_blockNumber", vec![])
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in eth_blockNumber response"))?;
        parse_hex_u64(&result).context("Failed to parse block number")
    }

    /// Gets the chain id the node serves via `eth_chainId`.
    pub async fn get_chain_id(&self) -> Result<u64> {
        let result: String = self
            .call("eth_chainId", vec![])
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in eth_chainId response"))?;
        parse_hex_u64(&result).context("Failed to parse chain id")
    }

    /// Queries transaction details by hash using `eth_getTransactionByHash`.
    ///
    /// Returns `Ok(None)` when the node does not know the transaction.
    pub async fn get_transaction(&self, hash: &str) -> Result<Option<EvmTransaction>> {
        let hash = ensure_0x_prefix(hash);
        self.call("eth_getTransactionByHash", vec![serde_json::json!(hash)])
            .await
    }

    /// Queries contract logs over an inclusive block range via `eth_getLogs`.
    ///
    /// # Arguments
    ///
    /// * `address` - Contract address emitting the events
    /// * `topic0` - Event signature topic (see [`events`])
    /// * `from_block` / `to_block` - Inclusive block range
    pub async fn get_logs(
        &self,
        address: &str,
        topic0: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<EvmLog>> {
        let filter = serde_json::json!({
            "address": address,
            "topics": [topic0],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });

        let logs: Vec<EvmLog> = self
            .call("eth_getLogs", vec![filter])
            .await?
            .unwrap_or_default();
        Ok(logs)
    }

    /// Performs a read-only contract call via `eth_call` at the latest block.
    ///
    /// `data` is the ABI-encoded calldata, hex with `0x` prefix. Returns the
    /// raw hex return data.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String> {
        let call = serde_json::json!({ "to": to, "data": data });
        self.call("eth_call", vec![call, serde_json::json!("latest")])
            .await?
            .ok_or_else(|| anyhow::anyhow!("No result in eth_call response"))
    }

    /// Fetches the current mint nonce of a user from the wrapped POKT
    /// contract (`getUserNonce(address)`).
    pub async fn get_user_nonce(&self, wpokt_address: &str, user: &str) -> Result<u64> {
        let user = user.strip_prefix("0x").unwrap_or(user);
        if user.len() != 40 {
            return Err(anyhow::anyhow!("Invalid user address: 0x{}", user));
        }
        // getUserNonce(address) selector
        let data = format!("0x{}{:0>64}", events::selector("getUserNonce(address)"), user);
        let result = self.eth_call(wpokt_address, &data).await?;
        parse_hex_u64(&result).context("Failed to parse user nonce")
    }

    /// Validates that the node serves the expected chain.
    ///
    /// Fails when the reported chain id disagrees with the configured one or
    /// when the node is unreachable. Callers treat a failure as fatal.
    pub async fn validate_network(&self) -> Result<()> {
        let chain_id = self
            .get_chain_id()
            .await
            .context("Failed to fetch chain id during network validation")?;
        if chain_id != self.expected_chain_id {
            return Err(anyhow::anyhow!(
                "EVM chain id mismatch: expected {}, got {}",
                self.expected_chain_id,
                chain_id
            ));
        }
        tracing::info!(chain_id, "Validated EVM network");
        Ok(())
    }

    /// Returns the base URL of this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// ============================================================================
// HEX HELPERS
// ============================================================================

/// Parses a `0x`-prefixed hex quantity into a u64.
pub fn parse_hex_u64(value: &str) -> Result<u64> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    // eth_call return data is a 32-byte word; the quantity sits at the tail
    let trimmed = if trimmed.len() > 16 {
        let (head, tail) = trimmed.split_at(trimmed.len() - 16);
        if head.chars().any(|c| c != '0') {
            return Err(anyhow::anyhow!("Hex quantity does not fit in u64: {}", value));
        }
        tail
    } else {
        trimmed
    };
    u64::from_str_radix(trimmed, 16).with_context(|| format!("Invalid hex quantity: {}", value))
}

/// Normalizes a hash or address to carry a `0x` prefix.
pub fn ensure_0x_prefix(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{}", value)
    }
}
