//! Mint Executor Service
//!
//! Watches the EVM chain for `Minted` events and closes the matching mint
//! record with `success` and the minting transaction hash. Scans are chunked
//! like the burn monitor's; the start block only advances when the whole
//! sweep succeeds.

use chain_clients_evm::events::{self, MintedEvent};
use chain_clients_evm::EvmClient;
use mongodb::bson::doc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::eth::checksum_address;
use crate::models::{self, Status};
use crate::service::runner::Service;
use crate::service::util::now;
use crate::storage::Database;

pub const MINT_EXECUTOR_NAME: &str = "mint-executor";

pub struct MintExecutor {
    db: Database,
    client: EvmClient,
    wpokt_address: String,
    vault_address: String,
    max_query_blocks: u64,
    start_block: i64,
    current_block: i64,
}

impl MintExecutor {
    pub fn new(
        db: Database,
        client: EvmClient,
        config: &Config,
        vault_address: String,
        start_block: i64,
    ) -> Self {
        Self {
            db,
            client,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
            vault_address,
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

    async fn handle_mint_event(&self, event: &MintedEvent) -> bool {
        debug!(
            hash = %event.transaction_hash,
            nonce = %event.nonce,
            "Handling mint event"
        );

        let recipient = match checksum_address(&event.recipient) {
            Ok(address) => address,
            Err(err) => {
                error!(?err, "Unparsable mint event recipient");
                return false;
            }
        };

        let filter = doc! {
            "wpokt_address": &self.wpokt_address,
            "vault_address": &self.vault_address,
            "recipient_address": recipient,
            "amount": &event.amount,
            "nonce": &event.nonce,
            "status": { "$in": [Status::Confirmed.as_str(), Status::Signed.as_str()] },
        };
        let update = doc! { "$set": {
            "status": Status::Success.as_str(),
            "mint_transaction_hash": event.transaction_hash.to_lowercase(),
            "updated_at": now(),
        }};

        match self
            .db
            .update_one(models::COLLECTION_MINTS, filter, update)
            .await
        {
            Ok(matched) => {
                if matched > 0 {
                    info!(hash = %event.transaction_hash, "Mint completed");
                }
                true
            }
            Err(err) => {
                error!(?err, "Error updating completed mint");
                false
            }
        }
    }

    async fn sync_blocks(&self, start_block: u64, end_block: u64) -> bool {
        let logs = match self
            .client
            .get_logs(
                &self.wpokt_address,
                &events::minted_topic(),
                start_block,
                end_block,
            )
            .await
        {
            Ok(logs) => logs,
            Err(err) => {
                error!(?err, "Error fetching mint events");
                return false;
            }
        };

        let mut iter = match events::iter_minted(&logs) {
            Ok(iter) => iter,
            Err(err) => {
                error!(?err, "Error decoding mint events");
                return false;
            }
        };

        let mut success = true;
        while iter.next() {
            success = self.handle_mint_event(iter.event()).await && success;
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
            debug!(from = chunk_start, to = chunk_end, "Syncing mint events");
            success = self.sync_blocks(chunk_start, chunk_end).await && success;
        }
        success
    }
}

impl Service for MintExecutor {
    fn name(&self) -> &'static str {
        MINT_EXECUTOR_NAME
    }

    async fn sweep(&mut self) -> bool {
        if !self.update_current_block().await {
            return false;
        }

        if self.current_block > self.start_block {
            let success = self.sync_txs().await;
            if success {
                self.start_block = self.current_block;
                info!(block = self.start_block, "Synced mint events");
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
