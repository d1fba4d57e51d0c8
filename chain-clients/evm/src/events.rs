//! Typed Events Module
//!
//! Typed decoding for the three wrapped POKT contract events the validator
//! consumes, plus the `Next()/Event()` iteration surface over a fetched log
//! range.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// `BurnAndBridge(uint256 indexed amount, address indexed from, address indexed poktAddress)`
pub const BURN_AND_BRIDGE_SIGNATURE: &str = "BurnAndBridge(uint256,address,address)";

/// `Transfer(address indexed from, address indexed to, uint256 value)`
pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// `Minted(address indexed recipient, uint256 indexed amount, uint256 indexed nonce)`
pub const MINTED_SIGNATURE: &str = "Minted(address,uint256,uint256)";

/// Raw log entry returned by `eth_getLogs`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvmLog {
    /// Address of the contract that emitted the event
    pub address: String,
    /// Array of topics (indexed event parameters)
    pub topics: Vec<String>,
    /// Event data (non-indexed parameters)
    pub data: String,
    /// Block number (JSON-RPC uses camelCase: blockNumber)
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    /// Transaction hash (JSON-RPC uses camelCase: transactionHash)
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    /// Log index (JSON-RPC uses camelCase: logIndex)
    #[serde(rename = "logIndex")]
    pub log_index: String,
}

/// `BurnAndBridge` event parsed from a log entry.
///
/// `pokt_address` is the 20-byte Pocket return address the burner packed
/// into an EVM address slot, hex without prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnAndBridgeEvent {
    /// Burned amount in upokt, decimal string
    pub amount: String,
    /// EVM address that burned the tokens
    pub from: String,
    /// Pocket address receiving the returned POKT (hex, no 0x prefix)
    pub pokt_address: String,
    /// Block number of the emitting transaction
    pub block_number: u64,
    /// Transaction hash
    pub transaction_hash: String,
    /// Log index within the block
    pub log_index: u64,
}

/// `Transfer` event parsed from a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: String,
    pub to: String,
    /// Transferred value, decimal string
    pub value: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

/// `Minted` event parsed from a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintedEvent {
    /// Recipient of the minted wPOKT
    pub recipient: String,
    /// Minted amount, decimal string
    pub amount: String,
    /// Mint nonce, decimal string
    pub nonce: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

// ============================================================================
// SIGNATURE HASHING
// ============================================================================

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the topic-0 value for an event signature string.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Computes the 4-byte function selector for a function signature string.
pub fn selector(signature: &str) -> String {
    hex::encode(&keccak256(signature.as_bytes())[..4])
}

/// Topic-0 of `BurnAndBridge`.
pub fn burn_and_bridge_topic() -> String {
    event_topic(BURN_AND_BRIDGE_SIGNATURE)
}

/// Topic-0 of `Transfer`.
pub fn transfer_topic() -> String {
    event_topic(TRANSFER_SIGNATURE)
}

/// Topic-0 of `Minted`.
pub fn minted_topic() -> String {
    event_topic(MINTED_SIGNATURE)
}

// ============================================================================
// DECODERS
// ============================================================================

/// Extracts a 20-byte address from a 32-byte topic word.
fn address_from_topic(topic: &str) -> Result<String> {
    let word = topic.strip_prefix("0x").unwrap_or(topic);
    if word.len() != 64 {
        return Err(anyhow::anyhow!("Invalid topic word: {}", topic));
    }
    Ok(format!("0x{}", &word[24..]))
}

/// Extracts a uint256 from a 32-byte word as a decimal string.
///
/// Values above u128::MAX are rejected; bridge amounts never get there.
fn uint_from_word(word: &str) -> Result<String> {
    let word = word.strip_prefix("0x").unwrap_or(word);
    if word.len() != 64 {
        return Err(anyhow::anyhow!("Invalid uint256 word: {}", word));
    }
    let (head, tail) = word.split_at(32);
    if head.chars().any(|c| c != '0') {
        return Err(anyhow::anyhow!("uint256 out of range: {}", word));
    }
    let value = u128::from_str_radix(tail, 16).context("Invalid uint256 word")?;
    Ok(value.to_string())
}

fn parse_log_position(log: &EvmLog) -> Result<(u64, u64)> {
    let block_number = super::parse_hex_u64(&log.block_number)
        .context("Invalid log block number")?;
    let log_index = super::parse_hex_u64(&log.log_index).context("Invalid log index")?;
    Ok((block_number, log_index))
}

/// Decodes a `BurnAndBridge` log entry.
pub fn decode_burn_and_bridge(log: &EvmLog) -> Result<BurnAndBridgeEvent> {
    if log.topics.len() != 4 {
        return Err(anyhow::anyhow!(
            "BurnAndBridge log has {} topics, expected 4",
            log.topics.len()
        ));
    }
    let (block_number, log_index) = parse_log_position(log)?;
    Ok(BurnAndBridgeEvent {
        amount: uint_from_word(&log.topics[1])?,
        from: address_from_topic(&log.topics[2])?,
        pokt_address: address_from_topic(&log.topics[3])?
            .trim_start_matches("0x")
            .to_string(),
        block_number,
        transaction_hash: log.transaction_hash.clone(),
        log_index,
    })
}

/// Decodes a `Transfer` log entry.
pub fn decode_transfer(log: &EvmLog) -> Result<TransferEvent> {
    if log.topics.len() != 3 {
        return Err(anyhow::anyhow!(
            "Transfer log has {} topics, expected 3",
            log.topics.len()
        ));
    }
    let (block_number, log_index) = parse_log_position(log)?;
    Ok(TransferEvent {
        from: address_from_topic(&log.topics[1])?,
        to: address_from_topic(&log.topics[2])?,
        value: uint_from_word(&log.data)?,
        block_number,
        transaction_hash: log.transaction_hash.clone(),
        log_index,
    })
}

/// Decodes a `Minted` log entry.
pub fn decode_minted(log: &EvmLog) -> Result<MintedEvent> {
    if log.topics.len() != 4 {
        return Err(anyhow::anyhow!(
            "Minted log has {} topics, expected 4",
            log.topics.len()
        ));
    }
    let (block_number, log_index) = parse_log_position(log)?;
    Ok(MintedEvent {
        recipient: address_from_topic(&log.topics[1])?,
        amount: uint_from_word(&log.topics[2])?,
        nonce: uint_from_word(&log.topics[3])?,
        block_number,
        transaction_hash: log.transaction_hash.clone(),
        log_index,
    })
}

// ============================================================================
// ITERATION
// ============================================================================

/// Iterator over decoded events with the `next()/event()` contract used by
/// the sweep loops: `next()` advances and reports whether an event is
/// available, `event()` returns the current one.
#[derive(Debug)]
pub struct EventIterator<E> {
    events: Vec<E>,
    cursor: Option<usize>,
}

impl<E> EventIterator<E> {
    pub fn new(events: Vec<E>) -> Self {
        Self {
            events,
            cursor: None,
        }
    }

    /// Advances to the next event, returning `false` once exhausted.
    pub fn next(&mut self) -> bool {
        let next = match self.cursor {
            None => 0,
            Some(i) => i + 1,
        };
        if next < self.events.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    /// Returns the current event. Panics if `next()` has not returned `true`.
    pub fn event(&self) -> &E {
        let i = self.cursor.expect("event() called before next()");
        &self.events[i]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Decodes all logs of a range into an event iterator, failing on the first
/// malformed log so the sweep can retry the whole range.
pub fn iter_burn_and_bridge(logs: &[EvmLog]) -> Result<EventIterator<BurnAndBridgeEvent>> {
    let events = logs
        .iter()
        .map(decode_burn_and_bridge)
        .collect::<Result<Vec<_>>>()?;
    Ok(EventIterator::new(events))
}

/// Decodes `Minted` logs into an event iterator.
pub fn iter_minted(logs: &[EvmLog]) -> Result<EventIterator<MintedEvent>> {
    let events = logs.iter().map(decode_minted).collect::<Result<Vec<_>>>()?;
    Ok(EventIterator::new(events))
}

/// Decodes `Transfer` logs into an event iterator.
pub fn iter_transfer(logs: &[EvmLog]) -> Result<EventIterator<TransferEvent>> {
    let events = logs
        .iter()
        .map(decode_transfer)
        .collect::<Result<Vec<_>>>()?;
    Ok(EventIterator::new(events))
}
