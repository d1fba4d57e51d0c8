//! Document Models Module
//!
//! Persistent document kinds of the bridge state machine, one struct per
//! MongoDB collection, plus the shared status domain. Numeric chain values
//! (heights, amounts, confirmations, nonces) ride as decimal strings, exactly
//! as they are stored.

use serde::{Deserialize, Serialize};

/// Collection holding valid mint records
pub const COLLECTION_MINTS: &str = "shannonMints";
/// Collection holding burn records
pub const COLLECTION_BURNS: &str = "shannonBurns";
/// Collection holding invalid mint records
pub const COLLECTION_INVALID_MINTS: &str = "shannonInvalidMints";
/// Collection holding per-service health records
pub const COLLECTION_HEALTHCHECKS: &str = "healthchecks";

// ============================================================================
// STATUS DOMAIN
// ============================================================================

/// Lifecycle status shared by mint, invalid-mint, and burn records.
///
/// The order of the variants is the total order of the state machine;
/// `Failed` absorbs. Every persisted update filters on the expected prior
/// status, so transitions are monotonic per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Confirmed,
    Signed,
    Submitted,
    Success,
    Failed,
}

impl Status {
    /// String form as stored in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Confirmed => "confirmed",
            Status::Signed => "signed",
            Status::Submitted => "submitted",
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Staying in place is allowed (confirmation counts may move without a
    /// status change); stepping backwards is not, and nothing leaves
    /// `Success` or `Failed`.
    pub fn can_advance(&self, next: Status) -> bool {
        match self {
            Status::Success | Status::Failed => *self == next,
            _ => next == Status::Failed || next >= *self,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DOCUMENT KINDS
// ============================================================================

/// Parsed memo of a vault deposit directing a mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintMemo {
    /// EVM recipient, EIP-55 normalized
    pub address: String,
    /// EVM chain id, decimal string
    pub chain_id: String,
}

/// EIP-712 message content authorizing an EVM mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintData {
    pub recipient: String,
    pub amount: String,
    pub nonce: String,
}

/// A vault deposit with a valid memo, pending its wPOKT mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mint {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub transaction_hash: String,
    pub height: String,
    pub confirmations: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    pub recipient_address: String,
    pub recipient_chain_id: String,
    pub wpokt_address: String,
    pub vault_address: String,
    pub amount: String,
    pub memo: Option<MintMemo>,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub status: Status,
    pub data: Option<MintData>,
    pub nonce: String,
    pub signers: Vec<String>,
    pub signatures: Vec<String>,
    pub mint_transaction_hash: String,
}

/// A vault deposit whose memo failed validation, pending its return transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidMint {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub transaction_hash: String,
    pub height: String,
    pub confirmations: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    /// Raw memo as seen on chain
    pub memo: String,
    pub amount: String,
    pub vault_address: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub status: Status,
    pub signers: Vec<String>,
    /// Hex-encoded partially/fully signed Pocket return transaction
    pub return_tx: String,
    pub return_tx_hash: String,
}

/// A wPOKT burn observed on the EVM chain, pending its return transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Burn {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub transaction_hash: String,
    pub log_index: String,
    pub block_number: String,
    pub confirmations: String,
    pub wpokt_address: String,
    pub sender_address: String,
    pub sender_chain_id: String,
    /// Pocket return address, hex without prefix as packed in the event
    pub recipient_address: String,
    pub recipient_chain_id: String,
    pub amount: String,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
    pub status: Status,
    pub signers: Vec<String>,
    pub return_tx: String,
    pub return_tx_hash: String,
}

/// Per-service health record, overwritten each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub healthy: bool,
    /// Last Pocket height the service observed; empty for EVM-only services
    pub pokt_height: String,
    /// Last EVM block the service observed; empty for Pocket-only services
    pub eth_block_number: String,
    pub last_sync_time: bson::DateTime,
    pub next_sync_time: bson::DateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_matches_state_machine() {
        assert!(Status::Pending < Status::Confirmed);
        assert!(Status::Confirmed < Status::Signed);
        assert!(Status::Signed < Status::Submitted);
        assert!(Status::Submitted < Status::Success);
    }

    #[test]
    fn status_never_steps_backwards() {
        assert!(Status::Pending.can_advance(Status::Confirmed));
        assert!(Status::Confirmed.can_advance(Status::Confirmed));
        assert!(!Status::Signed.can_advance(Status::Pending));
        assert!(!Status::Success.can_advance(Status::Failed));
        assert!(!Status::Failed.can_advance(Status::Pending));
        assert!(Status::Submitted.can_advance(Status::Failed));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Status::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }
}
