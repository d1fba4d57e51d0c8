//! Pocket Chain Module
//!
//! Keys, addresses, and transaction plumbing for the Pocket side of the
//! bridge: the vault multisig key, canonical signer ordering, and the
//! build / decode / co-sign / re-encode cycle of return transactions.

pub mod keys;
pub mod proto;
pub mod tx;

pub use keys::{
    bech32_from_bytes, bytes_from_bech32, parse_pocket_address, CosmosPublicKey, MultisigKey,
};
pub use tx::{sign_return_tx, ReturnTxParams, SignedReturnTx};
