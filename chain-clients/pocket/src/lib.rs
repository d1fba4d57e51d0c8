//! Pocket Client Module
//!
//! This module provides a client for communicating with a Pocket node via its
//! JSON RPC API. It covers the queries the validator needs: chain height and
//! block header, transaction lookup, raw transaction broadcast, account
//! lookup, and the paginated sweep of transactions received at the vault.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod types;

pub use types::{
    AccountResponse, AccountTxsResponse, BlockResponse, HeightResponse, SubmitRawTxResponse,
    TxResponse,
};

/// Message type of a value transfer on Pocket
pub const SEND_MSG_TYPE: &str = "pos/Send";

/// Page size used for the vault transaction sweep
const ACCOUNT_TXS_PER_PAGE: u32 = 1000;

/// Maximum tolerated gap between node height and latest block header height
const MAX_HEIGHT_SKEW: i64 = 3;

// ============================================================================
// POCKET CLIENT IMPLEMENTATION
// ============================================================================

/// Client for communicating with a Pocket node.
///
/// Every request carries the timeout configured at construction.
#[derive(Debug, Clone)]
pub struct PocketClient {
    /// HTTP client for making requests
    client: Client,
    /// Base URL of the Pocket node (e.g., "http://127.0.0.1:8081")
    base_url: String,
    /// Chain id the node is expected to serve
    expected_chain_id: String,
}

impl PocketClient {
    /// Creates a new Pocket client for the given node URL.
    ///
    /// # Arguments
    ///
    /// * `node_url` - Base URL of the Pocket node
    /// * `expected_chain_id` - Chain id the node must report in `validate_network`
    /// * `timeout` - Per-request RPC timeout
    pub fn new(node_url: &str, expected_chain_id: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: node_url.trim_end_matches('/').to_string(),
            expected_chain_id: expected_chain_id.to_string(),
        })
    }

    /// Posts a JSON body to a query path and deserializes the response.
    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Pocket RPC error from {}: {} ({})",
                url,
                status,
                text
            ));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Gets the current chain height via `/v1/query/height`.
    pub async fn get_height(&self) -> Result<HeightResponse> {
        self.query("/v1/query/height", serde_json::json!({})).await
    }

    /// Gets the latest block header via `/v1/query/block`.
    pub async fn get_block(&self) -> Result<BlockResponse> {
        self.query("/v1/query/block", serde_json::json!({})).await
    }

    /// Gets a transaction by hash via `/v1/query/tx`.
    pub async fn get_tx(&self, hash: &str) -> Result<TxResponse> {
        let hash = hash.trim_start_matches("0x");
        self.query("/v1/query/tx", serde_json::json!({ "hash": hash, "prove": false }))
            .await
    }

    /// Gets account details (account number, sequence) via `/v1/query/account`.
    pub async fn get_account(&self, address: &str) -> Result<AccountResponse> {
        self.query(
            "/v1/query/account",
            serde_json::json!({ "address": address }),
        )
        .await
    }

    /// Broadcasts a signed raw transaction via `/v1/client/rawtx`.
    ///
    /// # Arguments
    ///
    /// * `from_address` - Hex address of the sending account (the multisig)
    /// * `raw_hex_bytes` - Hex-encoded signed transaction
    pub async fn submit_raw_tx(
        &self,
        from_address: &str,
        raw_hex_bytes: &str,
    ) -> Result<SubmitRawTxResponse> {
        self.query(
            "/v1/client/rawtx",
            serde_json::json!({
                "address": from_address,
                "raw_hex_bytes": raw_hex_bytes,
            }),
        )
        .await
    }

    /// Fetches one page of transactions received at an address.
    async fn get_account_txs_page(&self, address: &str, page: u32) -> Result<AccountTxsResponse> {
        self.query(
            "/v1/query/accounttxs",
            serde_json::json!({
                "address": address,
                "page": page,
                "per_page": ACCOUNT_TXS_PER_PAGE,
                "received": true,
                "prove": true,
                "order": "asc",
            }),
        )
        .await
    }

    /// Fetches all `pos/Send` transactions received at `address` at or above
    /// `min_height`.
    ///
    /// Pages ascend by height; the sweep stops when a page comes back empty,
    /// when the accumulated transactions reach the reported total, or when
    /// the last transaction of a page is already below `min_height`.
    pub async fn get_account_txs_by_height(
        &self,
        address: &str,
        min_height: i64,
    ) -> Result<Vec<TxResponse>> {
        let mut txs: Vec<TxResponse> = Vec::new();
        let mut page: u32 = 1;

        loop {
            let res = self
                .get_account_txs_page(address, page)
                .await
                .with_context(|| format!("Failed to fetch account txs page {}", page))?;

            for tx in &res.txs {
                if tx.std_tx.msg.type_url == SEND_MSG_TYPE && tx.height >= min_height {
                    txs.push(tx.clone());
                }
            }

            let last_below_min = res
                .txs
                .last()
                .map(|tx| tx.height < min_height)
                .unwrap_or(false);

            if res.txs.is_empty() || txs.len() >= res.total_txs as usize || last_below_min {
                break;
            }
            page += 1;
        }

        Ok(txs)
    }

    /// Validates that the node serves the expected chain and is not stalled.
    ///
    /// Fails when the reported chain id disagrees with the configured one or
    /// when node height and block header height differ by more than
    /// [`MAX_HEIGHT_SKEW`]. Callers treat a failure as fatal.
    pub async fn validate_network(&self) -> Result<()> {
        let block = self
            .get_block()
            .await
            .context("Failed to fetch block during network validation")?;
        let height = self
            .get_height()
            .await
            .context("Failed to fetch height during network validation")?;

        if block.block.header.chain_id != self.expected_chain_id {
            return Err(anyhow::anyhow!(
                "Pocket chain id mismatch: expected {}, got {}",
                self.expected_chain_id,
                block.block.header.chain_id
            ));
        }

        let header_height: i64 = block
            .block
            .header
            .height
            .parse()
            .context("Failed to parse block header height")?;
        if height.height - header_height > MAX_HEIGHT_SKEW {
            return Err(anyhow::anyhow!(
                "Pocket height mismatch: node reports {}, latest block header is {}",
                height.height,
                header_height
            ));
        }

        tracing::info!(
            chain_id = %self.expected_chain_id,
            height = header_height,
            "Validated Pocket network"
        );
        Ok(())
    }

    /// Returns the base URL of this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
