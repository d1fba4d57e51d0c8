//! Mint Signer Service
//!
//! Produces this validator's EIP-712 signature authorizing the EVM mint for
//! every confirmed mint record it has not signed yet. Before signing, the
//! deposit is re-validated against the Pocket chain; a deposit that no
//! longer checks out is marked failed. The recipient's mint nonce comes from
//! the wrapped POKT contract, bumped past any nonce already assigned to the
//! recipient's other in-flight mints.

use chain_clients_evm::EvmClient;
use chain_clients_pocket::{PocketClient, SEND_MSG_TYPE};
use mongodb::bson::doc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::eth::{self, address::to_checksum, eip712};
use crate::models::{self, Mint, MintData, Status};
use crate::service::runner::Service;
use crate::service::util::{now, update_status_and_confirmations, validate_memo};
use crate::signer::ValidatorSigner;
use crate::storage::Database;

pub const MINT_SIGNER_NAME: &str = "mint-signer";

pub struct MintSigner {
    db: Database,
    pocket_client: PocketClient,
    evm_client: EvmClient,
    signer: ValidatorSigner,
    /// This validator's EVM address, EIP-55 normalized
    address: String,
    num_signers: usize,
    eth_chain_id: u64,
    mint_controller: [u8; 20],
    wpokt_address: String,
    vault_address: String,
    pocket_confirmations: i64,
    /// Deposits must exceed this amount (the return fee) to mint
    minimum_amount: u128,
    pokt_height: i64,
}

impl MintSigner {
    pub fn new(
        db: Database,
        pocket_client: PocketClient,
        evm_client: EvmClient,
        signer: ValidatorSigner,
        config: &Config,
        vault_address: String,
    ) -> anyhow::Result<Self> {
        let address = to_checksum(&signer.eth_address());
        let mint_controller = eth::parse_address(&config.ethereum.mint_controller_address)?;
        Ok(Self {
            db,
            pocket_client,
            evm_client,
            signer,
            address,
            num_signers: config.mint_signer_count(),
            eth_chain_id: config.ethereum.chain_id,
            mint_controller,
            wpokt_address: config.ethereum.wrapped_pocket_address.to_lowercase(),
            vault_address,
            pocket_confirmations: config.pocket.confirmations,
            minimum_amount: config.pocket.tx_fee as u128,
            pokt_height: 0,
        })
    }

    async fn update_blocks(&mut self) -> bool {
        match self.pocket_client.get_height().await {
            Ok(res) => {
                self.pokt_height = res.height;
                true
            }
            Err(err) => {
                error!(?err, "Error fetching Pocket height");
                false
            }
        }
    }

    /// Checks the mint record against the deposit actually on chain.
    async fn validate_mint(&self, mint: &Mint) -> anyhow::Result<bool> {
        debug!(hash = %mint.transaction_hash, "Validating mint");
        let tx = self.pocket_client.get_tx(&mint.transaction_hash).await?;

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
            .eq_ignore_ascii_case(&mint.sender_address)
        {
            debug!("Deposit sender does not match record");
            return Ok(false);
        }

        let amount: u128 = match tx.std_tx.msg.value.amount.parse() {
            Ok(amount) => amount,
            Err(_) => return Ok(false),
        };
        if amount <= self.minimum_amount {
            debug!("Deposit amount too low");
            return Ok(false);
        }
        if tx.std_tx.msg.value.amount != mint.amount {
            debug!("Deposit amount does not match record");
            return Ok(false);
        }

        let Some(memo) = validate_memo(&tx.std_tx.memo, self.eth_chain_id) else {
            debug!("Deposit memo failed validation");
            return Ok(false);
        };
        if !memo.address.eq_ignore_ascii_case(&mint.recipient_address) {
            debug!("Memo address does not match record recipient");
            return Ok(false);
        }
        if memo.chain_id != mint.recipient_chain_id {
            debug!("Memo chain id does not match record");
            return Ok(false);
        }

        Ok(true)
    }

    /// Resolves the mint nonce: the recorded one when present, otherwise the
    /// contract nonce bumped past the recipient's other in-flight mints.
    async fn find_nonce(&self, mint: &Mint) -> anyhow::Result<u64> {
        if let Some(data) = &mint.data {
            if let Ok(nonce) = data.nonce.parse::<u64>() {
                if nonce > 0 {
                    return Ok(nonce);
                }
            }
        }
        if let Ok(nonce) = mint.nonce.parse::<u64>() {
            if nonce > 0 {
                return Ok(nonce);
            }
        }

        debug!("Mint nonce not set, fetching from contract");
        let mut current = self
            .evm_client
            .get_user_nonce(&self.wpokt_address, &mint.recipient_address)
            .await?;

        let filter = doc! {
            "_id": { "$ne": mint.id },
            "vault_address": &self.vault_address,
            "wpokt_address": &self.wpokt_address,
            "recipient_address": &mint.recipient_address,
            "status": { "$in": [
                Status::Pending.as_str(),
                Status::Confirmed.as_str(),
                Status::Signed.as_str(),
            ]},
        };
        let pending: Vec<Mint> = self.db.find_many(models::COLLECTION_MINTS, filter).await?;

        let highest_pending = pending
            .iter()
            .filter_map(|m| m.data.as_ref())
            .filter_map(|d| d.nonce.parse::<u64>().ok())
            .max();
        if let Some(pending_nonce) = highest_pending {
            if pending_nonce > current {
                debug!(pending_nonce, "Using highest pending nonce");
                current = pending_nonce;
            }
        }

        Ok(current + 1)
    }

    async fn handle_mint(&self, mint: &Mint) -> bool {
        debug!(hash = %mint.transaction_hash, "Handling mint");
        let Some(id) = mint.id else {
            error!("Mint has no document id");
            return false;
        };

        let (status, confirmations) = match update_status_and_confirmations(
            mint.status,
            &mint.confirmations,
            &mint.height,
            self.pokt_height,
            self.pocket_confirmations,
        ) {
            Ok(result) => result,
            Err(err) => {
                error!(?err, "Error computing mint confirmations");
                return false;
            }
        };

        let valid = match self.validate_mint(mint).await {
            Ok(valid) => valid,
            Err(err) => {
                error!(?err, "Error validating mint");
                return false;
            }
        };

        let update = if !valid {
            error!(hash = %mint.transaction_hash, "Mint failed validation");
            doc! { "$set": {
                "status": Status::Failed.as_str(),
                "updated_at": now(),
            }}
        } else if status == Status::Confirmed {
            debug!("Mint confirmed, signing");

            let recipient = match eth::parse_address(&mint.recipient_address) {
                Ok(address) => address,
                Err(err) => {
                    error!(?err, "Unparsable mint recipient");
                    return false;
                }
            };
            let amount: u128 = match mint.amount.parse() {
                Ok(amount) => amount,
                Err(_) => {
                    error!(amount = %mint.amount, "Unparsable mint amount");
                    return false;
                }
            };
            let nonce = match self.find_nonce(mint).await {
                Ok(nonce) => nonce,
                Err(err) => {
                    error!(?err, "Error finding mint nonce");
                    return false;
                }
            };

            let digest = eip712::mint_digest(
                self.eth_chain_id,
                &self.mint_controller,
                &recipient,
                amount,
                nonce as u128,
            );
            let signature = match self.signer.eth_sign(&digest).await {
                Ok(signature) => signature,
                Err(err) => {
                    error!(?err, "Error signing mint");
                    return false;
                }
            };

            let mut signatures = mint.signatures.clone();
            let mut signers = mint.signers.clone();
            signatures.push(format!("0x{}", hex::encode(signature)));
            signers.push(self.address.clone());
            let (signers, signatures) =
                match eip712::sort_signers_and_signatures(&signers, &signatures) {
                    Ok(sorted) => sorted,
                    Err(err) => {
                        error!(?err, "Error sorting mint signatures");
                        return false;
                    }
                };

            let status = if signers.len() == self.num_signers {
                Status::Signed
            } else {
                status
            };

            let data = MintData {
                recipient: mint.recipient_address.to_lowercase(),
                amount: amount.to_string(),
                nonce: nonce.to_string(),
            };
            let data_document = match mongodb::bson::to_document(&data) {
                Ok(document) => document,
                Err(err) => {
                    error!(?err, "Error serializing mint data");
                    return false;
                }
            };

            doc! { "$set": {
                "data": data_document,
                "nonce": nonce.to_string(),
                "signatures": signatures,
                "signers": signers,
                "status": status.as_str(),
                "confirmations": confirmations,
                "updated_at": now(),
            }}
        } else {
            debug!("Mint pending confirmation, not signing");
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
            .update_one(models::COLLECTION_MINTS, filter, update)
            .await
        {
            Ok(_) => {
                info!(hash = %mint.transaction_hash, "Handled mint");
                true
            }
            Err(err) => {
                error!(?err, "Error updating mint");
                false
            }
        }
    }

    async fn sync_txs(&self) -> bool {
        let filter = doc! {
            "wpokt_address": &self.wpokt_address,
            "vault_address": &self.vault_address,
            "status": { "$in": [Status::Pending.as_str(), Status::Confirmed.as_str()] },
            "signers": { "$nin": [&self.address] },
        };

        let mints: Vec<Mint> = match self.db.find_many(models::COLLECTION_MINTS, filter).await {
            Ok(docs) => docs,
            Err(err) => {
                error!(?err, "Error fetching pending mints");
                return false;
            }
        };
        debug!(count = mints.len(), "Found mints to sign");

        let mut success = true;
        for mint in &mints {
            success = self.handle_mint(mint).await && success;
        }
        success
    }
}

impl Service for MintSigner {
    fn name(&self) -> &'static str {
        MINT_SIGNER_NAME
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
}
