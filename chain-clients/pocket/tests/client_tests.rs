//! Pocket client tests against a mock RPC node.

use std::time::Duration;

use chain_clients_pocket::PocketClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);
const CHAIN_ID: &str = "pocket-test";
const VAULT: &str = "pokt1vaultvaultvaultvaultvaultvaultvaultv";

fn client(server: &MockServer) -> PocketClient {
    PocketClient::new(&server.uri(), CHAIN_ID, TIMEOUT).unwrap()
}

fn send_tx(hash: &str, height: i64, msg_type: &str) -> serde_json::Value {
    json!({
        "hash": hash,
        "height": height,
        "index": 0,
        "stdTx": {
            "memo": "",
            "msg": {
                "type": msg_type,
                "value": {
                    "from_address": "pokt1sender",
                    "to_address": VAULT,
                    "amount": "1000000",
                },
            },
        },
        "tx_result": { "code": 0 },
    })
}

#[tokio::test]
async fn fetches_height() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/height"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 4242 })))
        .mount(&server)
        .await;

    assert_eq!(client(&server).get_height().await.unwrap().height, 4242);
}

#[tokio::test]
async fn fetches_tx_by_hash() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/tx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(send_tx("abc123", 10, "pos/Send")))
        .mount(&server)
        .await;

    let tx = client(&server).get_tx("0xABC123").await.unwrap();
    assert_eq!(tx.hash, "abc123");
    assert_eq!(tx.std_tx.msg.value.amount, "1000000");
}

#[tokio::test]
async fn paginates_vault_transactions_and_filters() {
    let server = MockServer::start().await;

    // page 1: full page mix of message types
    Mock::given(method("POST"))
        .and(path("/v1/query/accounttxs"))
        .and(body_partial_json(json!({ "page": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page_count": 2,
            "total_txs": 4,
            "txs": [
                send_tx("tx1", 100, "pos/Send"),
                send_tx("tx2", 101, "pos/StakeValidator"),
            ],
        })))
        .mount(&server)
        .await;

    // page 2: below the min height, terminates the sweep
    Mock::given(method("POST"))
        .and(path("/v1/query/accounttxs"))
        .and(body_partial_json(json!({ "page": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page_count": 2,
            "total_txs": 4,
            "txs": [
                send_tx("tx3", 102, "pos/Send"),
                send_tx("tx4", 50, "pos/Send"),
            ],
        })))
        .mount(&server)
        .await;

    let txs = client(&server)
        .get_account_txs_by_height(VAULT, 100)
        .await
        .unwrap();
    let hashes: Vec<&str> = txs.iter().map(|tx| tx.hash.as_str()).collect();
    // non-send and below-min-height transactions are filtered out
    assert_eq!(hashes, vec!["tx1", "tx3"]);
}

#[tokio::test]
async fn empty_page_terminates_sweep() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/accounttxs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page_count": 0,
            "total_txs": 0,
            "txs": [],
        })))
        .mount(&server)
        .await;

    let txs = client(&server)
        .get_account_txs_by_height(VAULT, 0)
        .await
        .unwrap();
    assert!(txs.is_empty());
}

#[tokio::test]
async fn validates_matching_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "block": { "header": { "chain_id": CHAIN_ID, "height": "1000" } },
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query/height"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 1002 })))
        .mount(&server)
        .await;

    client(&server).validate_network().await.unwrap();
}

#[tokio::test]
async fn rejects_chain_id_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "block": { "header": { "chain_id": "other-chain", "height": "1000" } },
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query/height"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 1000 })))
        .mount(&server)
        .await;

    let err = client(&server).validate_network().await.unwrap_err();
    assert!(err.to_string().contains("chain id mismatch"));
}

#[tokio::test]
async fn rejects_stalled_node() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "block": { "header": { "chain_id": CHAIN_ID, "height": "1000" } },
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/query/height"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 1004 })))
        .mount(&server)
        .await;

    let err = client(&server).validate_network().await.unwrap_err();
    assert!(err.to_string().contains("height mismatch"));
}

#[tokio::test]
async fn surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/query/height"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    assert!(client(&server).get_height().await.is_err());
}
