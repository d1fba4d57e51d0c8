//! Burn Monitor Service
//!
//! Scans the EVM chain for `BurnAndBridge` events on the wrapped POKT
//! contract and records each as a burn keyed by `(tx_hash, log_index)`.
//! Log queries are chunked so a single call never spans more than the
//! configured block bound; any chunk failure aborts the sweep without
//! advancing the start block.

use chain_clients_evm::events::{self, BurnAndBridgeEvent};
use chain_clients_evm::EvmClient;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::{self, Burn, Status};
use crate::service::runner::Service;
use crate::service::util::now;
use crate::storage::Database;

pub const BURN_MONITOR_NAME: &str = "burn-monitor";

pub struct BurnMonitor {
    db: Database,
    client: EvmClient,
    wpokt_address: String,
    eth_chain_id: String,
    pocket_chain_id: String,
    max_query_blocks: u64,
    start_block: i64,
    current_block: i64,
}

impl BurnMonitor {
    pub fn new(
        db: Database,
        client: EvmClient,
        config: &Config,
        start_block: i64,
    ) -> Self {
        Self {
            db,
            client,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
            eth_chain_id: config.ethereum.chain_id.to_string(),
            pocket_chain_id: config.pocket.chain_id.clone(),
            max_query_blocks: config.ethereum.max_query_blocks,
            start_block,
            current_block: 0,
        }
    }

    async fn update_current_block(&mut self) -> bool {
        match self.client.get_block_number().await {
            Ok(block) => {
                self.current_block = block as i64;
                debug!(block = self.current_block, "Current EVM block");
                true
            }
            Err(err) => {
                error!(?err, "Error fetching EVM block number");
                false
            }
        }
    }

    async fn handle_burn_event(&self, event: &BurnAndBridgeEvent) -> bool {
        let doc = Burn {
            id: None,
            transaction_hash: event.transaction_hash.to_lowercase(),
            log_index: event.log_index.to_string(),
            block_number: event.block_number.to_string(),
            confirmations: "0".to_string(),
            wpokt_address: self.wpokt_address.clone(),
            sender_address: event.from.clone(),
            sender_chain_id: self.eth_chain_id.clone(),
            recipient_address: event.pokt_address.clone(),
            recipient_chain_id: self.pocket_chain_id.clone(),
            amount: event.amount.clone(),
            created_at: now(),
            updated_at: now(),
            status: Status::Pending,
            signers: vec![],
            return_tx: String::new(),
            return_tx_hash: String::new(),
        };

        match self.db.insert_one(models::COLLECTION_BURNS, &doc).await {
            Ok(true) => {
                debug!(
                    hash = %doc.transaction_hash,
                    log_index = %doc.log_index,
                    "Stored burn event"
                );
                true
            }
            Ok(false) => {
                debug!(
                    hash = %doc.transaction_hash,
                    log_index = %doc.log_index,
                    "Found duplicate burn event"
                );
                true
            }
            Err(err) => {
                error!(?err, "Error storing burn event");
                false
            }
        }
    }

    async fn sync_blocks(&self, start_block: u64, end_block: u64) -> bool {
        let logs = match self
            .client
            .get_logs(
                &self.wpokt_address,
                &events::burn_and_bridge_topic(),
                start_block,
                end_block,
            )
            .await
        {
            Ok(logs) => logs,
            Err(err) => {
                error!(?err, "Error fetching burn events");
                return false;
            }
        };

        let mut iter = match events::iter_burn_and_bridge(&logs) {
            Ok(iter) => iter,
            Err(err) => {
                error!(?err, "Error decoding burn events");
                return false;
            }
        };

        let mut success = true;
        while iter.next() {
            success = self.handle_burn_event(iter.event()).await && success;
        }
        success
    }

    async fn sync_txs(&self) -> bool {
        let ranges = crate::service::util::chunk_ranges(
            self.start_block as u64,
            self.current_block as u64,
            self.max_query_blocks,
        );
        let mut success = true;
        for (chunk_start, chunk_end) in ranges {
            debug!(from = chunk_start, to = chunk_end, "Syncing burn events");
            success = self.sync_blocks(chunk_start, chunk_end).await && success;
        }
        success
    }
}

impl Service for BurnMonitor {
    fn name(&self) -> &'static str {
        BURN_MONITOR_NAME
    }

    async fn sweep(&mut self) -> bool {
        if !self.update_current_block().await {
            return false;
        }

        if self.current_block > self.start_block {
            let success = self.sync_txs().await;
            if success {
                self.start_block = self.current_block;
                info!(block = self.start_block, "Synced burn events");
            }
            success
        } else {
            debug!("No new blocks to sync");
            true
        }
    }

    fn eth_block_number(&self) -> String {
        self.start_block.to_string()
    }
}
