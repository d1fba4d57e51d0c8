//! Multisig address generator: `generate-multisig --publickeys <csv> --threshold <n>`.
//!
//! Validates each hex-encoded compressed secp256k1 public key, prints its
//! account address in hex and bech32, then derives and prints the threshold
//! multisig (vault) address the same way the validator does.

use anyhow::{Context, Result};
use clap::Parser;

use pokt_validator::cosmos::{bech32_from_bytes, CosmosPublicKey, MultisigKey};

#[derive(Parser)]
#[command(name = "generate-multisig", about = "Derive a Pocket multisig address")]
struct Cli {
    /// Comma separated list of hex-encoded compressed secp256k1 public keys
    #[arg(long)]
    publickeys: String,

    /// Signature threshold of the multisig
    #[arg(long)]
    threshold: u32,

    /// Bech32 prefix of account addresses
    #[arg(long, default_value = "pokt")]
    bech32_prefix: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let hex_keys: Vec<&str> = cli
        .publickeys
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect();
    if hex_keys.is_empty() {
        anyhow::bail!("--publickeys must contain at least one key");
    }
    if cli.threshold == 0 || cli.threshold as usize > hex_keys.len() {
        anyhow::bail!("--threshold must be between 1 and the number of public keys");
    }

    let mut keys = Vec::with_capacity(hex_keys.len());
    for (i, hex_key) in hex_keys.iter().enumerate() {
        let key = CosmosPublicKey::from_hex(hex_key)
            .with_context(|| format!("Invalid public key {}: {}", i, hex_key))?;
        let address = key.address();
        println!("public key {}: {}", i, key.to_hex());
        println!("address hex: 0x{}", hex::encode(address));
        println!(
            "address bech32: {}",
            bech32_from_bytes(&cli.bech32_prefix, &address)?
        );
        keys.push(key);
    }

    println!("threshold: {}", cli.threshold);

    let multisig = MultisigKey::new(keys, cli.threshold)?;
    let address = multisig.address();
    println!("multisig address hex: 0x{}", hex::encode(address));
    println!(
        "multisig address bech32: {}",
        bech32_from_bytes(&cli.bech32_prefix, &address)?
    );
    Ok(())
}
