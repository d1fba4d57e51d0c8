//! Burn Signer Service
//!
//! Co-signs the Pocket return transaction for every confirmed burn and
//! invalid mint this validator has not signed yet. The first co-signer
//! builds the transaction; later ones decode `return_tx`, inject their
//! signature at the canonical multisig slot, and re-encode. A record whose
//! on-chain transaction no longer checks out, or whose amount does not
//! clear the fixed fee, is marked failed instead of signed.

use chain_clients_evm::EvmClient;
use chain_clients_pocket::{PocketClient, SEND_MSG_TYPE};
use mongodb::bson::doc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::cosmos::{self, MultisigKey, ReturnTxParams};
use crate::models::{self, Burn, InvalidMint, Status};
use crate::service::runner::Service;
use crate::service::util::{now, update_status_and_confirmations, validate_memo};
use crate::signer::ValidatorSigner;
use crate::storage::Database;

pub const BURN_SIGNER_NAME: &str = "burn-signer";

pub struct BurnSigner {
    db: Database,
    pocket_client: PocketClient,
    evm_client: EvmClient,
    signer: ValidatorSigner,
    multisig: MultisigKey,
    /// This validator's compressed Cosmos public key, hex
    public_key: String,
    vault_address: String,
    wpokt_address: String,
    pocket_chain_id: String,
    bech32_prefix: String,
    coin_denom: String,
    eth_chain_id: u64,
    pocket_confirmations: i64,
    eth_confirmations: i64,
    tx_fee: u64,
    pokt_height: i64,
    eth_block: i64,
}

impl BurnSigner {
    pub fn new(
        db: Database,
        pocket_client: PocketClient,
        evm_client: EvmClient,
        signer: ValidatorSigner,
        multisig: MultisigKey,
        config: &Config,
        vault_address: String,
    ) -> Self {
        let public_key = signer.cosmos_public_key().to_hex();
        Self {
            db,
            pocket_client,
            evm_client,
            signer,
            multisig,
            public_key,
            vault_address,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
            pocket_chain_id: config.pocket.chain_id.clone(),
            bech32_prefix: config.pocket.bech32_prefix.clone(),
            coin_denom: config.pocket.coin_denom.clone(),
            eth_chain_id: config.ethereum.chain_id,
            pocket_confirmations: config.pocket.confirmations,
            eth_confirmations: config.ethereum.confirmations,
            tx_fee: config.pocket.tx_fee,
            pokt_height: 0,
            eth_block: 0,
        }
    }

    async fn update_blocks(&mut self) -> bool {
        match self.pocket_client.get_height().await {
            Ok(res) => self.pokt_height = res.height,
            Err(err) => {
                error!(?err, "Error fetching Pocket height");
                return false;
            }
        }
        match self.evm_client.get_block_number().await {
            Ok(block) => self.eth_block = block as i64,
            Err(err) => {
                error!(?err, "Error fetching EVM block number");
                return false;
            }
        }
        true
    }

    /// CAS a record that can no longer be completed to failed.
    async fn mark_failed(&self, collection: &str, id: bson::oid::ObjectId) -> bool {
        let filter = doc! {
            "_id": id,
            "status": { "$in": [Status::Pending.as_str(), Status::Confirmed.as_str()] },
        };
        let update = doc! { "$set": {
            "status": Status::Failed.as_str(),
            "updated_at": now(),
        }};
        match self.db.update_one(collection, filter, update).await {
            Ok(_) => true,
            Err(err) => {
                error!(?err, "Error marking record failed");
                false
            }
        }
    }

    /// Checks an invalid mint against the transaction actually on chain.
    async fn validate_invalid_mint(&self, doc: &InvalidMint) -> anyhow::Result<bool> {
        let tx = self
            .pocket_client
            .get_tx(&doc.transaction_hash)
            .await?;

        if tx.hash.is_empty() || tx.tx_result.code != 0 {
            debug!("Deposit transaction not found or failed");
            return Ok(false);
        }
        if tx.std_tx.msg.type_url != SEND_MSG_TYPE {
            debug!("Deposit transaction is not a send");
            return Ok(false);
        }
        if !tx
            .std_tx
            .msg
            .value
            .to_address
            .eq_ignore_ascii_case(&self.vault_address)
        {
            debug!("Deposit recipient is not the vault");
            return Ok(false);
        }
        if !tx
            .std_tx
            .msg
            .value
            .from_address
            .eq_ignore_ascii_case(&doc.sender_address)
        {
            debug!("Deposit sender does not match record");
            return Ok(false);
        }
        if tx.std_tx.msg.value.amount != doc.amount {
            debug!("Deposit amount does not match record");
            return Ok(false);
        }
        // the memo must really be invalid, else this deposit mints instead
        if validate_memo(&tx.std_tx.memo, self.eth_chain_id).is_some() {
            debug!("Deposit memo is valid, record is not an invalid mint");
            return Ok(false);
        }
        Ok(true)
    }

    /// Signs the return transaction and produces the document update.
    async fn sign_and_update(
        &self,
        return_tx: &str,
        signers: &[String],
        to_address: [u8; 20],
        amount: u128,
        memo: &str,
        status: Status,
        confirmations: &str,
    ) -> anyhow::Result<bson::Document> {
        let account = self
            .pocket_client
            .get_account(&self.vault_address)
            .await?;
        let account_number: u64 = account.account_number.parse().unwrap_or(0);
        let sequence: u64 = account.sequence.parse().unwrap_or(0);

        let params = ReturnTxParams {
            chain_id: self.pocket_chain_id.clone(),
            bech32_prefix: self.bech32_prefix.clone(),
            coin_denom: self.coin_denom.clone(),
            to_address,
            amount: amount - self.tx_fee as u128,
            fee: self.tx_fee,
            memo: memo.to_string(),
            account_number,
            sequence,
        };

        let signed =
            cosmos::sign_return_tx(&self.signer, &self.multisig, return_tx, &params).await?;

        let mut all_signers = signers.to_vec();
        all_signers.push(self.public_key.clone());
        let all_signers = self.multisig.sort_signers(&all_signers);

        let status = if signed.signature_count == self.multisig.num_signers() {
            Status::Signed
        } else {
            status
        };

        Ok(doc! { "$set": {
            "return_tx": signed.return_tx,
            "signers": all_signers,
            "status": status.as_str(),
            "confirmations": confirmations,
            "updated_at": now(),
        }})
    }

    async fn handle_invalid_mint(&self, doc: &InvalidMint) -> bool {
        debug!(hash = %doc.transaction_hash, "Handling invalid mint");
        let Some(id) = doc.id else {
            error!("Invalid mint has no document id");
            return false;
        };

        let (status, confirmations) = match update_status_and_confirmations(
            doc.status,
            &doc.confirmations,
            &doc.height,
            self.pokt_height,
            self.pocket_confirmations,
        ) {
            Ok(result) => result,
            Err(err) => {
                error!(?err, "Error computing invalid mint confirmations");
                return false;
            }
        };

        let update = if status == Status::Confirmed {
            match self.validate_invalid_mint(doc).await {
                Ok(true) => {}
                Ok(false) => {
                    error!(hash = %doc.transaction_hash, "Invalid mint failed validation");
                    return self
                        .mark_failed(models::COLLECTION_INVALID_MINTS, id)
                        .await;
                }
                Err(err) => {
                    error!(?err, "Error validating invalid mint");
                    return false;
                }
            }

            let amount: u128 = match doc.amount.parse() {
                Ok(amount) => amount,
                Err(_) => {
                    error!(amount = %doc.amount, "Unparsable invalid mint amount");
                    return self
                        .mark_failed(models::COLLECTION_INVALID_MINTS, id)
                        .await;
                }
            };
            if amount <= self.tx_fee as u128 {
                error!(amount, "Invalid mint amount does not clear the fee");
                return self
                    .mark_failed(models::COLLECTION_INVALID_MINTS, id)
                    .await;
            }

            let to_address =
                match cosmos::parse_pocket_address(&self.bech32_prefix, &doc.sender_address) {
                    Ok(address) => address,
                    Err(err) => {
                        error!(?err, "Unparsable invalid mint sender address");
                        return false;
                    }
                };

            match self
                .sign_and_update(
                    &doc.return_tx,
                    &doc.signers,
                    to_address,
                    amount,
                    &doc.transaction_hash,
                    status,
                    &confirmations,
                )
                .await
            {
                Ok(update) => update,
                Err(err) => {
                    error!(?err, "Error signing invalid mint");
                    return false;
                }
            }
        } else {
            debug!("Invalid mint pending confirmation, not signing");
            doc! { "$set": {
                "status": status.as_str(),
                "confirmations": confirmations,
                "updated_at": now(),
            }}
        };

        let filter = doc! {
            "_id": id,
            "status": { "$in": [Status::Pending.as_str(), Status::Confirmed.as_str()] },
        };
        match self
            .db
            .update_one(models::COLLECTION_INVALID_MINTS, filter, update)
            .await
        {
            Ok(_) => {
                info!(hash = %doc.transaction_hash, "Handled invalid mint");
                true
            }
            Err(err) => {
                error!(?err, "Error updating invalid mint");
                false
            }
        }
    }

    async fn handle_burn(&self, doc: &Burn) -> bool {
        debug!(hash = %doc.transaction_hash, log_index = %doc.log_index, "Handling burn");
        let Some(id) = doc.id else {
            error!("Burn has no document id");
            return false;
        };

        let (status, confirmations) = match update_status_and_confirmations(
            doc.status,
            &doc.confirmations,
            &doc.block_number,
            self.eth_block,
            self.eth_confirmations,
        ) {
            Ok(result) => result,
            Err(err) => {
                error!(?err, "Error computing burn confirmations");
                return false;
            }
        };

        let update = if status == Status::Confirmed {
            let amount: u128 = match doc.amount.parse() {
                Ok(amount) => amount,
                Err(_) => {
                    error!(amount = %doc.amount, "Unparsable burn amount");
                    return self.mark_failed(models::COLLECTION_BURNS, id).await;
                }
            };
            if amount <= self.tx_fee as u128 {
                error!(amount, "Burn amount does not clear the fee");
                return self.mark_failed(models::COLLECTION_BURNS, id).await;
            }

            let to_address = match cosmos::parse_pocket_address(
                &self.bech32_prefix,
                &doc.recipient_address,
            ) {
                Ok(address) => address,
                Err(err) => {
                    error!(?err, "Unparsable burn recipient address");
                    return self.mark_failed(models::COLLECTION_BURNS, id).await;
                }
            };

            match self
                .sign_and_update(
                    &doc.return_tx,
                    &doc.signers,
                    to_address,
                    amount,
                    &doc.transaction_hash,
                    status,
                    &confirmations,
                )
                .await
            {
                Ok(update) => update,
                Err(err) => {
                    error!(?err, "Error signing burn");
                    return false;
                }
            }
        } else {
            debug!("Burn pending confirmation, not signing");
            doc! { "$set": {
                "status": status.as_str(),
                "confirmations": confirmations,
                "updated_at": now(),
            }}
        };

        let filter = doc! {
            "_id": id,
            "status": { "$in": [Status::Pending.as_str(), Status::Confirmed.as_str()] },
        };
        match self
            .db
            .update_one(models::COLLECTION_BURNS, filter, update)
            .await
        {
            Ok(_) => {
                info!(hash = %doc.transaction_hash, "Handled burn");
                true
            }
            Err(err) => {
                error!(?err, "Error updating burn");
                false
            }
        }
    }

    async fn sync_txs(&self) -> bool {
        let pending = doc! { "$in": [Status::Pending.as_str(), Status::Confirmed.as_str()] };

        let invalid_mints: Vec<InvalidMint> = match self
            .db
            .find_many(
                models::COLLECTION_INVALID_MINTS,
                doc! {
                    "vault_address": &self.vault_address,
                    "status": pending.clone(),
                    "signers": { "$nin": [&self.public_key] },
                },
            )
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                error!(?err, "Error fetching invalid mints");
                return false;
            }
        };
        debug!(count = invalid_mints.len(), "Found invalid mints to sign");

        let mut success = true;
        for doc in &invalid_mints {
            success = self.handle_invalid_mint(doc).await && success;
        }

        let burns: Vec<Burn> = match self
            .db
            .find_many(
                models::COLLECTION_BURNS,
                doc! {
                    "wpokt_address": &self.wpokt_address,
                    "status": pending,
                    "signers": { "$nin": [&self.public_key] },
                },
            )
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                error!(?err, "Error fetching burns");
                return false;
            }
        };
        debug!(count = burns.len(), "Found burns to sign");

        for doc in &burns {
            success = self.handle_burn(doc).await && success;
        }
        success
    }
}

impl Service for BurnSigner {
    fn name(&self) -> &'static str {
        BURN_SIGNER_NAME
    }

    async fn sweep(&mut self) -> bool {
        if !self.update_blocks().await {
            return false;
        }
        self.sync_txs().await
    }

    fn pokt_height(&self) -> String {
        self.pokt_height.to_string()
    }

    fn eth_block_number(&self) -> String {
        self.eth_block.to_string()
    }
}
