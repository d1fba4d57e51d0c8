//! Mint Monitor Service
//!
//! Scans Pocket for deposits received at the vault, classifies each as a
//! valid or invalid mint by its memo, and inserts the corresponding record.
//! Inserts are idempotent under the unique transaction-hash index, so a
//! failed sweep simply re-scans the same height range on the next tick.

use chain_clients_pocket::{PocketClient, TxResponse};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::{self, InvalidMint, Mint, Status};
use crate::service::runner::Service;
use crate::service::util::{now, validate_memo};
use crate::storage::Database;

pub const MINT_MONITOR_NAME: &str = "mint-monitor";

pub struct MintMonitor {
    db: Database,
    client: PocketClient,
    vault_address: String,
    wpokt_address: String,
    pocket_chain_id: String,
    eth_chain_id: u64,
    start_height: i64,
    current_height: i64,
}

impl MintMonitor {
    pub fn new(
        db: Database,
        client: PocketClient,
        config: &Config,
        vault_address: String,
        start_height: i64,
    ) -> Self {
        Self {
            db,
            client,
            vault_address,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
            pocket_chain_id: config.pocket.chain_id.clone(),
            eth_chain_id: config.ethereum.chain_id,
            start_height,
            current_height: 0,
        }
    }

    async fn update_current_height(&mut self) -> bool {
        match self.client.get_height().await {
            Ok(res) => {
                self.current_height = res.height;
                debug!(height = self.current_height, "Current Pocket height");
                true
            }
            Err(err) => {
                error!(?err, "Error fetching Pocket height");
                false
            }
        }
    }

    async fn handle_valid_mint(&self, tx: &TxResponse, memo: models::MintMemo) -> bool {
        let doc = Mint {
            id: None,
            transaction_hash: tx.hash.to_lowercase(),
            height: tx.height.to_string(),
            confirmations: "0".to_string(),
            sender_address: tx.std_tx.msg.value.from_address.clone(),
            sender_chain_id: self.pocket_chain_id.clone(),
            recipient_address: memo.address.clone(),
            recipient_chain_id: memo.chain_id.clone(),
            wpokt_address: self.wpokt_address.clone(),
            vault_address: self.vault_address.clone(),
            amount: tx.std_tx.msg.value.amount.clone(),
            memo: Some(memo),
            created_at: now(),
            updated_at: now(),
            status: Status::Pending,
            data: None,
            nonce: String::new(),
            signers: vec![],
            signatures: vec![],
            mint_transaction_hash: String::new(),
        };

        match self.db.insert_one(models::COLLECTION_MINTS, &doc).await {
            Ok(true) => {
                debug!(hash = %doc.transaction_hash, "Stored mint");
                true
            }
            Ok(false) => {
                debug!(hash = %doc.transaction_hash, "Found duplicate mint");
                true
            }
            Err(err) => {
                error!(?err, "Error storing mint");
                false
            }
        }
    }

    async fn handle_invalid_mint(&self, tx: &TxResponse) -> bool {
        let doc = InvalidMint {
            id: None,
            transaction_hash: tx.hash.to_lowercase(),
            height: tx.height.to_string(),
            confirmations: "0".to_string(),
            sender_address: tx.std_tx.msg.value.from_address.clone(),
            sender_chain_id: self.pocket_chain_id.clone(),
            memo: tx.std_tx.memo.clone(),
            amount: tx.std_tx.msg.value.amount.clone(),
            vault_address: self.vault_address.clone(),
            created_at: now(),
            updated_at: now(),
            status: Status::Pending,
            signers: vec![],
            return_tx: String::new(),
            return_tx_hash: String::new(),
        };

        match self
            .db
            .insert_one(models::COLLECTION_INVALID_MINTS, &doc)
            .await
        {
            Ok(true) => {
                debug!(hash = %doc.transaction_hash, "Stored invalid mint");
                true
            }
            Ok(false) => {
                debug!(hash = %doc.transaction_hash, "Found duplicate invalid mint");
                true
            }
            Err(err) => {
                error!(?err, "Error storing invalid mint");
                false
            }
        }
    }

    async fn handle_tx(&self, tx: &TxResponse) -> bool {
        if tx.tx_result.code != 0 {
            debug!(hash = %tx.hash, "Skipping failed deposit transaction");
            return true;
        }

        match validate_memo(&tx.std_tx.memo, self.eth_chain_id) {
            Some(memo) => {
                debug!(hash = %tx.hash, memo = %tx.std_tx.memo, "Found valid mint");
                self.handle_valid_mint(tx, memo).await
            }
            None => {
                debug!(hash = %tx.hash, memo = %tx.std_tx.memo, "Found invalid mint");
                self.handle_invalid_mint(tx).await
            }
        }
    }

    async fn sync_txs(&self) -> bool {
        let txs = match self
            .client
            .get_account_txs_by_height(&self.vault_address, self.start_height)
            .await
        {
            Ok(txs) => txs,
            Err(err) => {
                error!(?err, "Error fetching vault transactions");
                return false;
            }
        };
        debug!(count = txs.len(), "Found deposit transactions to sync");

        let mut success = true;
        for tx in &txs {
            success = self.handle_tx(tx).await && success;
        }
        success
    }
}

impl Service for MintMonitor {
    fn name(&self) -> &'static str {
        MINT_MONITOR_NAME
    }

    async fn sweep(&mut self) -> bool {
        if !self.update_current_height().await {
            return false;
        }

        if self.current_height > self.start_height {
            debug!(
                from = self.start_height,
                to = self.current_height,
                "Syncing deposit transactions"
            );
            let success = self.sync_txs().await;
            if success {
                self.start_height = self.current_height;
                info!(height = self.start_height, "Synced deposit transactions");
            }
            success
        } else {
            debug!("No new blocks to sync");
            true
        }
    }

    fn pokt_height(&self) -> String {
        self.start_height.to_string()
    }
}
