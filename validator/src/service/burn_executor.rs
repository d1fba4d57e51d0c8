//! Burn Executor Service
//!
//! Broadcasts fully-signed Pocket return transactions and tracks their
//! confirmation. A record stays `signed` until broadcast succeeds and
//! `submitted` until the transaction is visible on chain; there is no
//! automatic failure path beyond operator intervention.

use chain_clients_pocket::PocketClient;
use mongodb::bson::doc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::models::{self, Burn, InvalidMint, Status};
use crate::service::runner::Service;
use crate::service::util::now;
use crate::storage::Database;

pub const BURN_EXECUTOR_NAME: &str = "burn-executor";

pub struct BurnExecutor {
    db: Database,
    client: PocketClient,
    vault_address: String,
    wpokt_address: String,
}

impl BurnExecutor {
    pub fn new(
        db: Database,
        client: PocketClient,
        config: &Config,
        vault_address: String,
    ) -> Self {
        Self {
            db,
            client,
            vault_address,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
        }
    }

    /// Submits a signed return transaction, moving the record to submitted.
    async fn submit(
        &self,
        collection: &str,
        id: bson::oid::ObjectId,
        return_tx: &str,
    ) -> bool {
        let response = match self
            .client
            .submit_raw_tx(&self.vault_address, return_tx)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!(?err, "Error broadcasting return transaction");
                return false;
            }
        };

        let tx_hash = response.transaction_hash.to_lowercase();
        let filter = doc! { "_id": id, "status": Status::Signed.as_str() };
        let update = doc! { "$set": {
            "status": Status::Submitted.as_str(),
            "return_tx_hash": &tx_hash,
            "updated_at": now(),
        }};
        match self.db.update_one(collection, filter, update).await {
            Ok(_) => {
                info!(hash = %tx_hash, "Submitted return transaction");
                true
            }
            Err(err) => {
                error!(?err, "Error updating submitted record");
                false
            }
        }
    }

    /// Polls a submitted return transaction, moving the record to success
    /// once it is on chain.
    async fn check_submitted(
        &self,
        collection: &str,
        id: bson::oid::ObjectId,
        return_tx_hash: &str,
    ) -> bool {
        let tx = match self.client.get_tx(return_tx_hash).await {
            Ok(tx) => tx,
            Err(err) => {
                debug!(?err, hash = %return_tx_hash, "Return transaction not yet visible");
                return false;
            }
        };

        if tx.hash.is_empty() {
            debug!(hash = %return_tx_hash, "Return transaction not yet visible");
            return true;
        }
        if tx.tx_result.code != 0 {
            // left for operator intervention; the record stays submitted
            error!(
                hash = %return_tx_hash,
                code = tx.tx_result.code,
                "Return transaction failed on chain"
            );
            return true;
        }

        let filter = doc! { "_id": id, "status": Status::Submitted.as_str() };
        let update = doc! { "$set": {
            "status": Status::Success.as_str(),
            "updated_at": now(),
        }};
        match self.db.update_one(collection, filter, update).await {
            Ok(_) => {
                info!(hash = %return_tx_hash, "Return transaction confirmed");
                true
            }
            Err(err) => {
                error!(?err, "Error updating confirmed record");
                false
            }
        }
    }

    async fn handle(
        &self,
        collection: &str,
        id: Option<bson::oid::ObjectId>,
        status: Status,
        return_tx: &str,
        return_tx_hash: &str,
    ) -> bool {
        let Some(id) = id else {
            error!("Record has no document id");
            return false;
        };
        match status {
            Status::Signed => self.submit(collection, id, return_tx).await,
            Status::Submitted => self.check_submitted(collection, id, return_tx_hash).await,
            _ => {
                error!(%status, "Record has unexpected status");
                false
            }
        }
    }

    async fn sync_txs(&self) -> bool {
        let actionable = doc! { "$in": [Status::Signed.as_str(), Status::Submitted.as_str()] };

        let invalid_mints: Vec<InvalidMint> = match self
            .db
            .find_many(
                models::COLLECTION_INVALID_MINTS,
                doc! { "vault_address": &self.vault_address, "status": actionable.clone() },
            )
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                error!(?err, "Error fetching invalid mints");
                return false;
            }
        };
        debug!(count = invalid_mints.len(), "Found invalid mints to execute");

        let mut success = true;
        for doc in &invalid_mints {
            success = self
                .handle(
                    models::COLLECTION_INVALID_MINTS,
                    doc.id,
                    doc.status,
                    &doc.return_tx,
                    &doc.return_tx_hash,
                )
                .await
                && success;
        }

        let burns: Vec<Burn> = match self
            .db
            .find_many(
                models::COLLECTION_BURNS,
                doc! { "wpokt_address": &self.wpokt_address, "status": actionable },
            )
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                error!(?err, "Error fetching burns");
                return false;
            }
        };
        debug!(count = burns.len(), "Found burns to execute");

        for doc in &burns {
            success = self
                .handle(
                    models::COLLECTION_BURNS,
                    doc.id,
                    doc.status,
                    &doc.return_tx,
                    &doc.return_tx_hash,
                )
                .await
                && success;
        }
        success
    }
}

impl Service for BurnExecutor {
    fn name(&self) -> &'static str {
        BURN_EXECUTOR_NAME
    }

    async fn sweep(&mut self) -> bool {
        self.sync_txs().await
    }
}
