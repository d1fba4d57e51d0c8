//! EVM address parsing and EIP-55 checksum normalization.

use anyhow::Result;
use sha3::{Digest, Keccak256};

/// Parses a 20-byte EVM address from a hex string, with or without a `0x`
/// prefix. Case is ignored; length is not.
pub fn parse_address(address: &str) -> Result<[u8; 20]> {
    let hex_part = address.strip_prefix("0x").unwrap_or(address);
    if hex_part.len() != 40 {
        return Err(anyhow::anyhow!("Invalid EVM address: {}", address));
    }
    let bytes = hex::decode(hex_part)
        .map_err(|_| anyhow::anyhow!("Invalid EVM address: {}", address))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Renders an address in EIP-55 mixed-case checksum form.
pub fn to_checksum(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let mut hasher = Keccak256::new();
    hasher.update(lower.as_bytes());
    let hash = hasher.finalize();

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalizes a hex address string to its EIP-55 checksum form.
pub fn checksum_address(address: &str) -> Result<String> {
    Ok(to_checksum(&parse_address(address)?))
}

/// Whether the address is the zero address.
pub fn is_zero_address(address: &[u8; 20]) -> bool {
    address.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_known_vectors() {
        // Test vectors from EIP-55
        for addr in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            assert_eq!(checksum_address(&addr.to_lowercase()).unwrap(), addr);
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not an address").is_err());
        assert!(parse_address("0xzz6916095ca1df60bb79ce92ce3ea74c37c5d359").is_err());
    }

    #[test]
    fn detects_zero_address() {
        assert!(is_zero_address(&[0u8; 20]));
        assert!(!is_zero_address(
            &parse_address("0x0000000000000000000000000000000000000001").unwrap()
        ));
    }
}
