//! Local signer backed by a BIP-39 mnemonic or raw private key.
//!
//! Derives the Ethereum key at `m/44'/60'/0'/0/0` and the Cosmos key at
//! `m/44'/118'/0'/0/0` from the mnemonic with an empty passphrase. A raw
//! private key drives both sides with the same key material, which is what
//! the KMS variant does too.

use anyhow::{Context, Result};
use bip32::{DerivationPath, Language, Mnemonic, XPrv};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::cosmos::CosmosPublicKey;
use crate::eth::eip712::address_of;

/// BIP-44 derivation path of the Ethereum key
pub const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";
/// BIP-44 derivation path of the Cosmos key
pub const COSMOS_DERIVATION_PATH: &str = "m/44'/118'/0'/0/0";

pub struct LocalSigner {
    eth_key: SigningKey,
    cosmos_key: SigningKey,
    eth_address: [u8; 20],
    cosmos_public_key: CosmosPublicKey,
}

impl LocalSigner {
    /// Derives both chain keys from a BIP-39 mnemonic (empty passphrase).
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::new(phrase.trim(), Language::English)
            .map_err(|_| anyhow::anyhow!("Invalid BIP-39 mnemonic"))?;
        let seed = mnemonic.to_seed("");

        let eth_path: DerivationPath = ETH_DERIVATION_PATH
            .parse()
            .context("Invalid Ethereum derivation path")?;
        let cosmos_path: DerivationPath = COSMOS_DERIVATION_PATH
            .parse()
            .context("Invalid Cosmos derivation path")?;

        let eth_key = XPrv::derive_from_path(&seed, &eth_path)
            .map_err(|_| anyhow::anyhow!("Failed to derive Ethereum key"))?
            .private_key()
            .clone();
        let cosmos_key = XPrv::derive_from_path(&seed, &cosmos_path)
            .map_err(|_| anyhow::anyhow!("Failed to derive Cosmos key"))?
            .private_key()
            .clone();

        Ok(Self::from_keys(eth_key, cosmos_key))
    }

    /// Drives both chain sides with one raw secp256k1 private key.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .context("Private key is not valid hex")?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| anyhow::anyhow!("Invalid secp256k1 private key"))?;
        Ok(Self::from_keys(key.clone(), key))
    }

    fn from_keys(eth_key: SigningKey, cosmos_key: SigningKey) -> Self {
        let eth_address = address_of(eth_key.verifying_key());
        let cosmos_public_key = CosmosPublicKey::from_verifying_key(cosmos_key.verifying_key());
        Self {
            eth_key,
            cosmos_key,
            eth_address,
            cosmos_public_key,
        }
    }

    pub fn eth_sign(&self, data: &[u8]) -> Result<[u8; 65]> {
        let digest = eth_digest(data);
        let (signature, recovery_id) = self
            .eth_key
            .sign_prehash_recoverable(&digest)
            .context("Failed to sign digest")?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        Ok(out)
    }

    pub fn cosmos_sign(&self, data: &[u8]) -> Result<[u8; 64]> {
        let digest = cosmos_digest(data);
        let signature: Signature = self
            .cosmos_key
            .sign_prehash(&digest)
            .context("Failed to sign digest")?;
        let signature = signature.normalize_s().unwrap_or(signature);

        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    pub fn eth_address(&self) -> [u8; 20] {
        self.eth_address
    }

    pub fn cosmos_public_key(&self) -> CosmosPublicKey {
        self.cosmos_public_key
    }
}

/// Treats 32-byte input as an already-computed digest, hashes otherwise.
pub fn eth_digest(data: &[u8]) -> [u8; 32] {
    match <[u8; 32]>::try_from(data) {
        Ok(digest) => digest,
        Err(_) => {
            let mut hasher = Keccak256::new();
            hasher.update(data);
            hasher.finalize().into()
        }
    }
}

/// SHA-256 counterpart of [`eth_digest`].
pub fn cosmos_digest(data: &[u8]) -> [u8; 32] {
    match <[u8; 32]>::try_from(data) {
        Ok(digest) => digest,
        Err(_) => Sha256::digest(data).into(),
    }
}
