//! Pocket account keys and addresses.
//!
//! Compressed secp256k1 public keys, their account addresses, bech32
//! rendering, and the legacy amino threshold multisig key whose address is
//! the vault. Canonical signer ordering is by raw address bytes; every
//! validator must derive the identical ordering.

use anyhow::{Context, Result};
use bech32::{Bech32, Hrp};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use prost::Message;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::proto;

/// Amino registration prefix of `tendermint/PubKeySecp256k1`,
/// including the 33-byte length marker.
const AMINO_SECP256K1_PREFIX: [u8; 5] = [0xeb, 0x5a, 0xe9, 0x87, 0x21];
/// Amino registration prefix of `tendermint/PubKeyMultisigThreshold`.
const AMINO_MULTISIG_PREFIX: [u8; 4] = [0x22, 0xc1, 0xf7, 0xe2];

// ============================================================================
// SINGLE KEYS
// ============================================================================

/// A validator's compressed secp256k1 public key on the Pocket chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CosmosPublicKey {
    bytes: [u8; 33],
}

impl CosmosPublicKey {
    /// Parses a compressed key from hex, validating it lies on the curve.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim_start_matches("0x"))
            .context("Public key is not valid hex")?;
        Self::from_bytes(&bytes)
    }

    /// Parses a key from SEC1 bytes (compressed or uncompressed), storing the
    /// compressed form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key = k256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| anyhow::anyhow!("Invalid secp256k1 public key"))?;
        let point = key.to_encoded_point(true);
        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(point.as_bytes());
        Ok(Self { bytes: compressed })
    }

    pub fn from_verifying_key(key: &k256::ecdsa::VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(point.as_bytes());
        Self { bytes: compressed }
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Account address: `ripemd160(sha256(compressed key))`.
    pub fn address(&self) -> [u8; 20] {
        let sha = Sha256::digest(self.bytes);
        let ripe = Ripemd160::digest(sha);
        let mut address = [0u8; 20];
        address.copy_from_slice(&ripe);
        address
    }

    /// Proto `Any` wrapping of the key for `SignerInfo`.
    pub fn to_any(&self) -> proto::Any {
        proto::Any {
            type_url: proto::SECP256K1_PUBKEY_TYPE_URL.to_string(),
            value: proto::PubKey {
                key: self.bytes.to_vec(),
            }
            .encode_to_vec(),
        }
    }

    /// Verifying key for signature checks.
    pub fn verifying_key(&self) -> Result<k256::ecdsa::VerifyingKey> {
        k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.bytes)
            .map_err(|_| anyhow::anyhow!("Invalid secp256k1 public key"))
    }
}

// ============================================================================
// MULTISIG KEY
// ============================================================================

/// The vault's m-of-n legacy amino threshold key.
///
/// Member keys are held sorted by address bytes; that ordering is the
/// canonical signer ordering of every multisig artifact.
#[derive(Debug, Clone)]
pub struct MultisigKey {
    keys: Vec<CosmosPublicKey>,
    threshold: u32,
}

impl MultisigKey {
    /// Builds the multisig key from member keys, sorting canonically.
    pub fn new(mut keys: Vec<CosmosPublicKey>, threshold: u32) -> Result<Self> {
        if keys.is_empty() {
            return Err(anyhow::anyhow!("Multisig requires at least one key"));
        }
        if threshold == 0 || threshold as usize > keys.len() {
            return Err(anyhow::anyhow!(
                "Multisig threshold {} out of range for {} keys",
                threshold,
                keys.len()
            ));
        }
        keys.sort_by(|a, b| a.address().cmp(&b.address()));
        Ok(Self { keys, threshold })
    }

    /// Parses hex member keys from configuration.
    pub fn from_hex_keys(hex_keys: &[String], threshold: u32) -> Result<Self> {
        let keys = hex_keys
            .iter()
            .map(|k| CosmosPublicKey::from_hex(k))
            .collect::<Result<Vec<_>>>()?;
        Self::new(keys, threshold)
    }

    pub fn keys(&self) -> &[CosmosPublicKey] {
        &self.keys
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Total number of member keys (the full validator set).
    pub fn num_signers(&self) -> usize {
        self.keys.len()
    }

    /// Position of a member key in the canonical ordering.
    pub fn index_of(&self, key: &CosmosPublicKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Legacy amino encoding of the threshold key, the SDK's address
    /// preimage.
    pub fn amino_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&AMINO_MULTISIG_PREFIX);
        // field 1: threshold, varint
        out.push(0x08);
        encode_uvarint(self.threshold as u64, &mut out);
        // field 2: member keys, each length-delimited amino bytes
        for key in &self.keys {
            let mut member = Vec::with_capacity(AMINO_SECP256K1_PREFIX.len() + 33);
            member.extend_from_slice(&AMINO_SECP256K1_PREFIX);
            member.extend_from_slice(key.as_bytes());
            out.push(0x12);
            encode_uvarint(member.len() as u64, &mut out);
            out.extend_from_slice(&member);
        }
        out
    }

    /// Vault address: first 20 bytes of `sha256(amino encoding)`.
    pub fn address(&self) -> [u8; 20] {
        let sha = Sha256::digest(self.amino_bytes());
        let mut address = [0u8; 20];
        address.copy_from_slice(&sha[..20]);
        address
    }

    /// Proto `Any` wrapping of the multisig key for `SignerInfo`.
    pub fn to_any(&self) -> proto::Any {
        proto::Any {
            type_url: proto::MULTISIG_PUBKEY_TYPE_URL.to_string(),
            value: proto::LegacyAminoPubKey {
                threshold: self.threshold,
                public_keys: self.keys.iter().map(|k| k.to_any()).collect(),
            }
            .encode_to_vec(),
        }
    }

    /// Sorts document signer entries (hex public keys) into the canonical
    /// member ordering. Unknown keys sort last, preserving their order.
    pub fn sort_signers(&self, signers: &[String]) -> Vec<String> {
        let mut sorted = signers.to_vec();
        sorted.sort_by_key(|s| {
            CosmosPublicKey::from_hex(s)
                .ok()
                .and_then(|k| self.index_of(&k))
                .unwrap_or(usize::MAX)
        });
        sorted
    }
}

fn encode_uvarint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

// ============================================================================
// BECH32 ADDRESSES
// ============================================================================

/// Renders an account address in bech32 with the configured prefix.
pub fn bech32_from_bytes(prefix: &str, bytes: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(prefix).context("Invalid bech32 prefix")?;
    bech32::encode::<Bech32>(hrp, bytes).context("Failed to encode bech32 address")
}

/// Decodes a bech32 account address, checking the prefix.
pub fn bytes_from_bech32(prefix: &str, address: &str) -> Result<[u8; 20]> {
    let (hrp, data) = bech32::decode(address).context("Invalid bech32 address")?;
    if hrp.as_str() != prefix {
        return Err(anyhow::anyhow!(
            "Address prefix mismatch: expected {}, got {}",
            prefix,
            hrp.as_str()
        ));
    }
    if data.len() != 20 {
        return Err(anyhow::anyhow!(
            "Address payload is {} bytes, expected 20",
            data.len()
        ));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&data);
    Ok(out)
}

/// Parses a Pocket account address given either as bech32 or as raw hex
/// (with or without `0x`), the two forms records carry.
pub fn parse_pocket_address(prefix: &str, address: &str) -> Result<[u8; 20]> {
    if address.starts_with(prefix) && bech32::decode(address).is_ok() {
        return bytes_from_bech32(prefix, address);
    }
    let hex_part = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(hex_part)
        .map_err(|_| anyhow::anyhow!("Invalid Pocket address: {}", address))?;
    if bytes.len() != 20 {
        return Err(anyhow::anyhow!("Invalid Pocket address: {}", address));
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}
