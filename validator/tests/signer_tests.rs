//! Local signer contract tests.

#[path = "helpers.rs"]
mod helpers;

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use pokt_validator::eth::address::to_checksum;
use pokt_validator::eth::eip712::recover_signer;
use pokt_validator::signer::LocalSigner;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use helpers::{local_signer, validator_signer, TEST_MNEMONIC};

#[tokio::test]
async fn eth_signature_recovers_to_signer_address() {
    let signer = validator_signer(1);
    let digest = [0x11u8; 32];

    let signature = signer.eth_sign(&digest).await.unwrap();
    assert_eq!(signature.len(), 65);
    assert!(signature[64] == 27 || signature[64] == 28);

    let recovered = recover_signer(&digest, &signature).unwrap();
    assert_eq!(recovered, to_checksum(&signer.eth_address()));
}

#[tokio::test]
async fn eth_sign_hashes_non_digest_input() {
    let signer = validator_signer(2);
    let message = b"hello world";

    let mut hasher = Keccak256::new();
    hasher.update(message);
    let digest: [u8; 32] = hasher.finalize().into();

    // deterministic signing: message path equals digest path
    let from_message = signer.eth_sign(message).await.unwrap();
    let from_digest = signer.eth_sign(&digest).await.unwrap();
    assert_eq!(from_message, from_digest);
}

#[tokio::test]
async fn cosmos_signature_is_compact_low_s_and_verifies() {
    let signer = validator_signer(3);
    let message = b"cosmos sign bytes";

    let signature = signer.cosmos_sign(message).await.unwrap();
    assert_eq!(signature.len(), 64);

    let parsed = k256::ecdsa::Signature::from_slice(&signature).unwrap();
    // low-S canonical: normalization is a no-op
    assert!(parsed.normalize_s().is_none());

    let digest: [u8; 32] = Sha256::digest(message).into();
    signer
        .cosmos_public_key()
        .verifying_key()
        .unwrap()
        .verify_prehash(&digest, &parsed)
        .unwrap();
}

#[test]
fn mnemonic_derives_known_eth_address() {
    let signer = LocalSigner::from_mnemonic(TEST_MNEMONIC).unwrap();
    // standard m/44'/60'/0'/0/0 vector for the test mnemonic
    assert_eq!(
        to_checksum(&signer.eth_address()),
        "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
    );
}

#[test]
fn mnemonic_chain_keys_differ() {
    let signer = LocalSigner::from_mnemonic(TEST_MNEMONIC).unwrap();
    let cosmos_key = signer.cosmos_public_key();
    assert_eq!(cosmos_key.as_bytes().len(), 33);
    assert!(cosmos_key.as_bytes()[0] == 0x02 || cosmos_key.as_bytes()[0] == 0x03);

    // the 60' and 118' paths must not collapse to the same key
    let eth_only = LocalSigner::from_private_key_hex(&hex::encode([9u8; 32])).unwrap();
    assert_ne!(cosmos_key.to_hex(), eth_only.cosmos_public_key().to_hex());
}

#[test]
fn raw_private_key_drives_both_chains() {
    let signer = local_signer(7);
    // same key material on both sides; addresses are derived per chain
    assert_eq!(signer.cosmos_public_key().address().len(), 20);
    assert_eq!(signer.eth_address().len(), 20);
}

#[test]
fn rejects_invalid_key_material() {
    assert!(LocalSigner::from_mnemonic("not a mnemonic").is_err());
    assert!(LocalSigner::from_private_key_hex("zz").is_err());
    assert!(LocalSigner::from_private_key_hex("00").is_err());
}
