//! Event decoding tests.

use chain_clients_evm::events::{
    self, EvmLog, BURN_AND_BRIDGE_SIGNATURE, MINTED_SIGNATURE, TRANSFER_SIGNATURE,
};

fn word_address(byte: u8) -> String {
    format!("0x{}{}", "0".repeat(24), hex::encode([byte; 20]))
}

fn word_uint(value: u128) -> String {
    format!("0x{:064x}", value)
}

fn burn_log() -> EvmLog {
    EvmLog {
        address: "0xwpokt".to_string(),
        topics: vec![
            events::event_topic(BURN_AND_BRIDGE_SIGNATURE),
            word_uint(1_000_000),
            word_address(0xaa),
            word_address(0xbb),
        ],
        data: "0x".to_string(),
        block_number: "0x10".to_string(),
        transaction_hash: "0xdeadbeef".to_string(),
        log_index: "0x2".to_string(),
    }
}

#[test]
fn transfer_topic_matches_known_value() {
    // canonical ERC-20 Transfer topic
    assert_eq!(
        events::event_topic(TRANSFER_SIGNATURE),
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
    );
}

#[test]
fn decodes_burn_and_bridge() {
    let event = events::decode_burn_and_bridge(&burn_log()).unwrap();
    assert_eq!(event.amount, "1000000");
    assert_eq!(event.from, format!("0x{}", hex::encode([0xaa; 20])));
    // pokt address keeps no 0x prefix, as packed in the slot
    assert_eq!(event.pokt_address, hex::encode([0xbb; 20]));
    assert_eq!(event.block_number, 16);
    assert_eq!(event.log_index, 2);
    assert_eq!(event.transaction_hash, "0xdeadbeef");
}

#[test]
fn rejects_burn_log_with_missing_topics() {
    let mut log = burn_log();
    log.topics.pop();
    assert!(events::decode_burn_and_bridge(&log).is_err());
}

#[test]
fn decodes_minted() {
    let log = EvmLog {
        address: "0xwpokt".to_string(),
        topics: vec![
            events::event_topic(MINTED_SIGNATURE),
            word_address(0xcc),
            word_uint(42),
            word_uint(7),
        ],
        data: "0x".to_string(),
        block_number: "0xff".to_string(),
        transaction_hash: "0xcafe".to_string(),
        log_index: "0x0".to_string(),
    };
    let event = events::decode_minted(&log).unwrap();
    assert_eq!(event.recipient, format!("0x{}", hex::encode([0xcc; 20])));
    assert_eq!(event.amount, "42");
    assert_eq!(event.nonce, "7");
    assert_eq!(event.block_number, 255);
}

#[test]
fn decodes_transfer_value_from_data() {
    let log = EvmLog {
        address: "0xwpokt".to_string(),
        topics: vec![
            events::event_topic(TRANSFER_SIGNATURE),
            word_address(0x01),
            word_address(0x02),
        ],
        data: word_uint(123_456),
        block_number: "0x1".to_string(),
        transaction_hash: "0xabcd".to_string(),
        log_index: "0x1".to_string(),
    };
    let event = events::decode_transfer(&log).unwrap();
    assert_eq!(event.value, "123456");
}

#[test]
fn rejects_uint_words_beyond_u128() {
    let mut log = burn_log();
    log.topics[1] = format!("0x{}", "f".repeat(64));
    assert!(events::decode_burn_and_bridge(&log).is_err());
}

#[test]
fn iterator_walks_events_in_order() {
    let logs = vec![burn_log(), {
        let mut second = burn_log();
        second.log_index = "0x3".to_string();
        second
    }];
    let mut iter = events::iter_burn_and_bridge(&logs).unwrap();
    assert_eq!(iter.len(), 2);
    assert!(iter.next());
    assert_eq!(iter.event().log_index, 2);
    assert!(iter.next());
    assert_eq!(iter.event().log_index, 3);
    assert!(!iter.next());
}

#[test]
fn iterator_over_no_logs_is_empty() {
    let mut iter = events::iter_burn_and_bridge(&[]).unwrap();
    assert!(iter.is_empty());
    assert!(!iter.next());
}
