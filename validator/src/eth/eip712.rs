//! EIP-712 hashing for the mint authorization.
//!
//! The mint controller verifies typed-data signatures over the `MintData`
//! primary type under the domain `{name: "MintController", version: "1",
//! chainId, verifyingContract}`. Every validator must produce byte-identical
//! digests, so the encoding below is fixed and exercised by tests.

use anyhow::{Context, Result};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

use super::address::{parse_address, to_checksum};

/// EIP-712 domain name of the mint controller
pub const DOMAIN_NAME: &str = "MintController";
/// EIP-712 domain version of the mint controller
pub const DOMAIN_VERSION: &str = "1";

const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const MINT_DATA_TYPE: &str = "MintData(address recipient,uint256 amount,uint256 nonce)";

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Left-pads a u128 into a 32-byte big-endian word.
fn encode_u256(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Left-pads an address into a 32-byte word.
fn encode_address(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

/// `hashStruct(EIP712Domain, {name, version, chainId, verifyingContract})`
pub fn domain_separator(chain_id: u64, verifying_contract: &[u8; 20]) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(&keccak256(EIP712_DOMAIN_TYPE.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_NAME.as_bytes()));
    encoded.extend_from_slice(&keccak256(DOMAIN_VERSION.as_bytes()));
    encoded.extend_from_slice(&encode_u256(chain_id as u128));
    encoded.extend_from_slice(&encode_address(verifying_contract));
    keccak256(&encoded)
}

/// `hashStruct(MintData, {recipient, amount, nonce})`
pub fn hash_mint_data(recipient: &[u8; 20], amount: u128, nonce: u128) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(4 * 32);
    encoded.extend_from_slice(&keccak256(MINT_DATA_TYPE.as_bytes()));
    encoded.extend_from_slice(&encode_address(recipient));
    encoded.extend_from_slice(&encode_u256(amount));
    encoded.extend_from_slice(&encode_u256(nonce));
    keccak256(&encoded)
}

/// The digest each validator signs:
/// `keccak256("\x19\x01" ‖ domainSeparator ‖ hashStruct(MintData, message))`.
pub fn mint_digest(
    chain_id: u64,
    verifying_contract: &[u8; 20],
    recipient: &[u8; 20],
    amount: u128,
    nonce: u128,
) -> [u8; 32] {
    let mut raw = Vec::with_capacity(2 + 32 + 32);
    raw.extend_from_slice(b"\x19\x01");
    raw.extend_from_slice(&domain_separator(chain_id, verifying_contract));
    raw.extend_from_slice(&hash_mint_data(recipient, amount, nonce));
    keccak256(&raw)
}

/// Recovers the checksummed signer address of a 65-byte `r‖s‖v` signature
/// over `digest`, with `v ∈ {27, 28}`.
pub fn recover_signer(digest: &[u8; 32], signature: &[u8]) -> Result<String> {
    if signature.len() != 65 {
        return Err(anyhow::anyhow!(
            "Signature length is {}, expected 65",
            signature.len()
        ));
    }
    let v = signature[64];
    let recovery_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(anyhow::anyhow!("Invalid recovery id: {}", v)),
    };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).context("Invalid recovery id byte")?;
    let sig = Signature::try_from(&signature[..64]).context("Malformed signature")?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .context("Failed to recover public key")?;
    Ok(to_checksum(&address_of(&key)))
}

/// EVM address of a verifying key.
pub fn address_of(key: &VerifyingKey) -> [u8; 20] {
    let uncompressed = key.to_encoded_point(false);
    let digest = keccak256(&uncompressed.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

/// Sorts signer addresses by their numeric value and permutes the signature
/// list to match, so all validators converge on one ordering regardless of
/// signing order. Addresses come back EIP-55 normalized.
pub fn sort_signers_and_signatures(
    signers: &[String],
    signatures: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    if signers.len() != signatures.len() {
        return Err(anyhow::anyhow!(
            "{} signers but {} signatures",
            signers.len(),
            signatures.len()
        ));
    }

    let mut pairs: Vec<([u8; 20], String)> = signers
        .iter()
        .zip(signatures.iter())
        .map(|(signer, signature)| Ok((parse_address(signer)?, signature.clone())))
        .collect::<Result<_>>()?;
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let sorted_signers = pairs.iter().map(|(a, _)| to_checksum(a)).collect();
    let sorted_signatures = pairs.into_iter().map(|(_, s)| s).collect();
    Ok((sorted_signers, sorted_signatures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_separator_is_stable() {
        let contract = parse_address("0x1111111111111111111111111111111111111111").unwrap();
        let a = domain_separator(5, &contract);
        let b = domain_separator(5, &contract);
        assert_eq!(a, b);
        assert_ne!(a, domain_separator(1, &contract));
    }

    #[test]
    fn digest_depends_on_every_field() {
        let contract = parse_address("0x1111111111111111111111111111111111111111").unwrap();
        let recipient = parse_address("0x2222222222222222222222222222222222222222").unwrap();
        let base = mint_digest(5, &contract, &recipient, 1_000_000, 1);
        assert_ne!(base, mint_digest(5, &contract, &recipient, 1_000_001, 1));
        assert_ne!(base, mint_digest(5, &contract, &recipient, 1_000_000, 2));
        assert_ne!(base, mint_digest(1, &contract, &recipient, 1_000_000, 1));
    }

    #[test]
    fn sorts_signers_numerically_and_keeps_pairs() {
        let signers = vec![
            "0x00000000000000000000000000000000000000ff".to_string(),
            "0x0000000000000000000000000000000000000001".to_string(),
        ];
        let signatures = vec!["0xsig-ff".to_string(), "0xsig-01".to_string()];
        let (sorted_signers, sorted_signatures) =
            sort_signers_and_signatures(&signers, &signatures).unwrap();
        assert_eq!(
            sorted_signers[0],
            "0x0000000000000000000000000000000000000001"
        );
        assert_eq!(sorted_signatures, vec!["0xsig-01", "0xsig-ff"]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(sort_signers_and_signatures(
            &["0x0000000000000000000000000000000000000001".to_string()],
            &[]
        )
        .is_err());
    }
}
