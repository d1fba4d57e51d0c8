//! Pocket RPC response types.
//!
//! Wire shapes mirror the node's JSON responses; numeric fields the node
//! serializes as strings stay strings here.

use serde::{Deserialize, Serialize};

/// Response of `/v1/query/height`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeightResponse {
    pub height: i64,
}

/// Response of `/v1/client/rawtx`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitRawTxResponse {
    #[serde(rename = "txhash")]
    pub transaction_hash: String,
}

/// Send-message body of a `pos/Send` transaction
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MsgValue {
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
}

/// Message wrapper inside a standard transaction
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Msg {
    pub value: MsgValue,
    #[serde(rename = "type")]
    pub type_url: String,
}

/// Standard transaction body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StdTx {
    pub memo: String,
    pub msg: Msg,
}

/// Execution result of a transaction
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TxResult {
    pub code: i64,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub signer: String,
}

/// Response of `/v1/query/tx` and element of `/v1/query/accounttxs`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TxResponse {
    pub hash: String,
    pub height: i64,
    #[serde(default)]
    pub index: i64,
    #[serde(rename = "stdTx")]
    pub std_tx: StdTx,
    #[serde(default)]
    pub tx_result: TxResult,
}

/// Response of `/v1/query/accounttxs`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountTxsResponse {
    #[serde(default)]
    pub page_count: u32,
    pub total_txs: u32,
    #[serde(default)]
    pub txs: Vec<TxResponse>,
}

/// Block header, chain id and height only
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Block {
    pub header: BlockHeader,
}

/// Response of `/v1/query/block`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockResponse {
    pub block: Block,
}

/// Response of `/v1/query/account`; only the signing-relevant fields
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountResponse {
    pub address: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub sequence: String,
}
