//! Configuration parsing and validation tests.

use pokt_validator::config::Config;

fn base_yaml() -> String {
    r#"
mongodb:
  uri: mongodb://localhost:27017
  database: validator

pocket:
  rpc_url: http://localhost:8081
  rpc_timeout_millis: 5000
  chain_id: pocket-test
  start_height: 100
  confirmations: 3
  tx_fee: 10000
  multisig_public_keys:
    - "02a1b2c3d4e5f60718293a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e"
    - "03a1b2c3d4e5f60718293a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e"
  multisig_threshold: 2
  mnemonic: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
  bech32_prefix: pokt

ethereum:
  rpc_url: http://localhost:8545
  rpc_timeout_secs: 10
  chain_id: 5
  start_block_number: 0
  confirmations: 12
  wrapped_pocket_address: "0x1111111111111111111111111111111111111111"
  mint_controller_address: "0x2222222222222222222222222222222222222222"

mint_monitor: { enabled: true, interval_secs: 30 }
mint_signer: { enabled: true, interval_secs: 30 }
mint_executor: { enabled: true, interval_secs: 30 }
burn_monitor: { enabled: true, interval_secs: 30 }
burn_signer: { enabled: true, interval_secs: 30 }
burn_executor: { enabled: true, interval_secs: 30 }

logger:
  level: debug
"#
    .to_string()
}

fn parse(yaml: &str) -> anyhow::Result<Config> {
    let config: Config = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[test]
fn parses_complete_config() {
    let config = parse(&base_yaml()).unwrap();
    assert_eq!(config.pocket.chain_id, "pocket-test");
    assert_eq!(config.ethereum.chain_id, 5);
    assert_eq!(config.pocket.tx_fee, 10_000);
    assert_eq!(config.logger.level, "debug");
    // defaults
    assert_eq!(config.ethereum.max_query_blocks, 100_000);
    assert_eq!(config.pocket.coin_denom, "upokt");
    assert_eq!(config.mint_signer_count(), 2);
}

#[test]
fn requires_exactly_one_key_source() {
    let no_key = base_yaml().replace(
        "  mnemonic: \"abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about\"\n",
        "",
    );
    assert!(parse(&no_key).is_err());

    let two_keys = base_yaml().replace(
        "  bech32_prefix: pokt",
        "  bech32_prefix: pokt\n  gcp_kms_key_name: projects/p/locations/l/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1",
    );
    assert!(parse(&two_keys).is_err());
}

#[test]
fn rejects_out_of_range_threshold() {
    let bad = base_yaml().replace("multisig_threshold: 2", "multisig_threshold: 3");
    assert!(parse(&bad).is_err());
}

#[test]
fn validator_addresses_override_signer_count() {
    let with_validators = base_yaml().replace(
        "  mint_controller_address: \"0x2222222222222222222222222222222222222222\"",
        "  mint_controller_address: \"0x2222222222222222222222222222222222222222\"\n  validator_addresses:\n    - \"0x3333333333333333333333333333333333333333\"\n    - \"0x4444444444444444444444444444444444444444\"\n    - \"0x5555555555555555555555555555555555555555\"",
    );
    let config = parse(&with_validators).unwrap();
    assert_eq!(config.mint_signer_count(), 3);
}

#[test]
fn rejects_malformed_yaml() {
    assert!(parse("mongodb: [").is_err());
}
