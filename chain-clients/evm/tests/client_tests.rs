//! EVM client tests against a mock JSON-RPC server.

use std::time::Duration;

use chain_clients_evm::{events, EvmClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": 1,
    }))
}

async fn mock_rpc(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(rpc_result(result))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_block_number() {
    let server = MockServer::start().await;
    mock_rpc(&server, "eth_blockNumber", json!("0x3e8")).await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    assert_eq!(client.get_block_number().await.unwrap(), 1000);
}

#[tokio::test]
async fn validates_matching_network() {
    let server = MockServer::start().await;
    mock_rpc(&server, "eth_chainId", json!("0x5")).await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    client.validate_network().await.unwrap();
}

#[tokio::test]
async fn rejects_chain_id_mismatch() {
    let server = MockServer::start().await;
    mock_rpc(&server, "eth_chainId", json!("0x1")).await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    let err = client.validate_network().await.unwrap_err();
    assert!(err.to_string().contains("mismatch"));
}

#[tokio::test]
async fn surfaces_rpc_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": null,
            "error": { "code": -32000, "message": "header not found" },
            "id": 1,
        })))
        .mount(&server)
        .await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    let err = client.get_block_number().await.unwrap_err();
    assert!(err.to_string().contains("header not found"));
}

#[tokio::test]
async fn missing_transaction_is_none() {
    let server = MockServer::start().await;
    mock_rpc(&server, "eth_getTransactionByHash", json!(null)).await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    let tx = client.get_transaction("0xabc").await.unwrap();
    assert!(tx.is_none());
}

#[tokio::test]
async fn fetches_and_decodes_logs() {
    let server = MockServer::start().await;
    let topic = events::event_topic(events::BURN_AND_BRIDGE_SIGNATURE);
    mock_rpc(
        &server,
        "eth_getLogs",
        json!([{
            "address": "0x1111111111111111111111111111111111111111",
            "topics": [
                topic,
                format!("0x{:064x}", 1_000_000u64),
                format!("0x{}{}", "0".repeat(24), "aa".repeat(20)),
                format!("0x{}{}", "0".repeat(24), "bb".repeat(20)),
            ],
            "data": "0x",
            "blockNumber": "0x64",
            "transactionHash": "0xfeed",
            "logIndex": "0x0",
        }]),
    )
    .await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    let logs = client
        .get_logs("0x1111111111111111111111111111111111111111", &topic, 0, 200)
        .await
        .unwrap();
    let mut iter = events::iter_burn_and_bridge(&logs).unwrap();
    assert!(iter.next());
    assert_eq!(iter.event().amount, "1000000");
    assert_eq!(iter.event().block_number, 100);
}

#[tokio::test]
async fn fetches_user_nonce_via_eth_call() {
    let server = MockServer::start().await;
    mock_rpc(&server, "eth_call", json!(format!("0x{:064x}", 9u64))).await;

    let client = EvmClient::new(&server.uri(), 5, TIMEOUT).unwrap();
    let nonce = client
        .get_user_nonce(
            "0x1111111111111111111111111111111111111111",
            "0x2222222222222222222222222222222222222222",
        )
        .await
        .unwrap();
    assert_eq!(nonce, 9);
}
