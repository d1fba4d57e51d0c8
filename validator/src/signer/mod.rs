//! Signer Module
//!
//! The polymorphic signing capability every validator holds: one secp256k1
//! key producing both Ethereum signatures (65-byte recoverable, for the
//! EIP-712 mint authorization) and Cosmos signatures (64-byte compact low-S,
//! for the Pocket multisig). Two variants exist: a local signer derived
//! from a BIP-39 mnemonic or raw key, and a remote signer backed by a Cloud
//! KMS HSM key. Both share a byte-for-byte identical output contract so
//! downstream consumers cannot distinguish them.

use anyhow::Result;

use crate::config::PocketConfig;
use crate::cosmos::CosmosPublicKey;

pub mod kms;
pub mod local;

pub use kms::{GcpKmsSigner, KmsClient};
pub use local::LocalSigner;

/// Signing failures that carry meaning beyond their message.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// Neither recovery id recovers the signer's address from a KMS
    /// signature
    #[error("recovered address does not match signer address")]
    AddressMismatch,
    /// The KMS signature's s component is above the half curve order
    #[error("signature is not in lower-S form")]
    NotLowS,
    /// The signer was destroyed and can no longer sign
    #[error("signer has been destroyed")]
    Destroyed,
}

/// A validator's signing capability, one of two interchangeable variants.
pub enum ValidatorSigner {
    Local(LocalSigner),
    Kms(GcpKmsSigner),
}

impl ValidatorSigner {
    /// Constructs the signer variant selected by configuration.
    pub async fn from_config(config: &PocketConfig) -> Result<Self> {
        if !config.mnemonic.is_empty() {
            return Ok(Self::Local(LocalSigner::from_mnemonic(&config.mnemonic)?));
        }
        if !config.gcp_kms_key_name.is_empty() {
            return Ok(Self::Kms(
                GcpKmsSigner::new(&config.gcp_kms_key_name).await?,
            ));
        }
        if !config.private_key.is_empty() {
            return Ok(Self::Local(LocalSigner::from_private_key_hex(
                &config.private_key,
            )?));
        }
        Err(anyhow::anyhow!("No signer key material configured"))
    }

    /// Signs `data` for Ethereum: keccak-256 pre-hash unless `data` is
    /// already a 32-byte digest, output `r‖s‖v` with `v ∈ {27, 28}`.
    pub async fn eth_sign(&self, data: &[u8]) -> Result<[u8; 65]> {
        match self {
            Self::Local(signer) => signer.eth_sign(data),
            Self::Kms(signer) => signer.eth_sign(data).await,
        }
    }

    /// Signs `data` for Cosmos: SHA-256 pre-hash unless `data` is already a
    /// 32-byte digest, output 64-byte compact `r‖s` in low-S form.
    pub async fn cosmos_sign(&self, data: &[u8]) -> Result<[u8; 64]> {
        match self {
            Self::Local(signer) => signer.cosmos_sign(data),
            Self::Kms(signer) => signer.cosmos_sign(data).await,
        }
    }

    /// The signer's EVM address.
    pub fn eth_address(&self) -> [u8; 20] {
        match self {
            Self::Local(signer) => signer.eth_address(),
            Self::Kms(signer) => signer.eth_address(),
        }
    }

    /// The signer's compressed Cosmos public key.
    pub fn cosmos_public_key(&self) -> CosmosPublicKey {
        match self {
            Self::Local(signer) => signer.cosmos_public_key(),
            Self::Kms(signer) => signer.cosmos_public_key(),
        }
    }

    /// Releases any external handle. Idempotent; a destroyed signer fails
    /// all subsequent signing calls.
    pub fn destroy(&mut self) {
        if let Self::Kms(signer) = self {
            signer.destroy();
        }
    }
}
