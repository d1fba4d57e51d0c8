//! Shared test helpers.

#![allow(dead_code)]

use pokt_validator::cosmos::{MultisigKey, ReturnTxParams};
use pokt_validator::signer::{LocalSigner, ValidatorSigner};

/// Standard BIP-39 test mnemonic
pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub const BECH32_PREFIX: &str = "pokt";
pub const CHAIN_ID: &str = "pocket-test";
pub const COIN_DENOM: &str = "upokt";

/// Deterministic local signer from a one-byte seed.
pub fn local_signer(seed: u8) -> LocalSigner {
    LocalSigner::from_private_key_hex(&hex::encode([seed; 32])).unwrap()
}

pub fn validator_signer(seed: u8) -> ValidatorSigner {
    ValidatorSigner::Local(local_signer(seed))
}

/// Multisig over the cosmos keys of the given signers.
pub fn multisig_of(signers: &[&ValidatorSigner], threshold: u32) -> MultisigKey {
    let hex_keys: Vec<String> = signers
        .iter()
        .map(|s| s.cosmos_public_key().to_hex())
        .collect();
    MultisigKey::from_hex_keys(&hex_keys, threshold).unwrap()
}

/// Return transaction parameters with fixed test values.
pub fn return_params() -> ReturnTxParams {
    ReturnTxParams {
        chain_id: CHAIN_ID.to_string(),
        bech32_prefix: BECH32_PREFIX.to_string(),
        coin_denom: COIN_DENOM.to_string(),
        to_address: [0x42; 20],
        amount: 990_000,
        fee: 10_000,
        memo: "abc123".to_string(),
        account_number: 7,
        sequence: 3,
    }
}
