//! KMS signer tests against a mock Cloud KMS REST endpoint.
//!
//! A local key stands in for the HSM: the mock serves its SPKI PEM and
//! DER signatures produced with it, which is exactly what the real service
//! returns.

use base64::{engine::general_purpose, Engine as _};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::EncodePublicKey;
use pokt_validator::eth::address::to_checksum;
use pokt_validator::eth::eip712::{address_of, recover_signer};
use pokt_validator::signer::{GcpKmsSigner, KmsClient};
use serde_json::json;
use sha2::Digest;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_NAME: &str =
    "projects/p/locations/l/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1";

fn test_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

fn spki_pem(key: &SigningKey) -> String {
    let public = k256::PublicKey::from_sec1_bytes(
        key.verifying_key().to_encoded_point(false).as_bytes(),
    )
    .unwrap();
    public
        .to_public_key_pem(k256::pkcs8::LineEnding::LF)
        .unwrap()
}

fn der_signature(key: &SigningKey, digest: &[u8; 32]) -> Vec<u8> {
    let signature: Signature = key.sign_prehash(digest).unwrap();
    signature.to_der().as_bytes().to_vec()
}

async fn mount_key(server: &MockServer, key: &SigningKey, algorithm: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", KEY_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": KEY_NAME,
            "algorithm": algorithm,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/publicKey", KEY_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pem": spki_pem(key),
            "algorithm": algorithm,
        })))
        .mount(server)
        .await;
}

async fn mount_signature(server: &MockServer, der: &[u8]) {
    Mock::given(method("POST"))
        .and(path(format!("/{}:asymmetricSign", KEY_NAME)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "signature": general_purpose::STANDARD.encode(der),
        })))
        .mount(server)
        .await;
}

async fn signer_with_key(server: &MockServer, key: &SigningKey) -> GcpKmsSigner {
    mount_key(server, key, "EC_SIGN_SECP256K1_SHA256").await;
    let client = KmsClient::with_base_url(&server.uri(), "test-token").unwrap();
    GcpKmsSigner::with_client(client, KEY_NAME).await.unwrap()
}

#[tokio::test]
async fn rejects_wrong_key_algorithm() {
    let server = MockServer::start().await;
    let key = test_key(1);
    mount_key(&server, &key, "EC_SIGN_P256_SHA256").await;

    let client = KmsClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = GcpKmsSigner::with_client(client, KEY_NAME)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("EC_SIGN_SECP256K1_SHA256"));
}

#[tokio::test]
async fn derives_same_addresses_as_local_key_material() {
    let server = MockServer::start().await;
    let key = test_key(5);
    let kms = signer_with_key(&server, &key).await;

    let local =
        pokt_validator::signer::LocalSigner::from_private_key_hex(&hex::encode([5u8; 32]))
            .unwrap();
    assert_eq!(kms.eth_address(), local.eth_address());
    assert_eq!(
        kms.cosmos_public_key().to_hex(),
        local.cosmos_public_key().to_hex()
    );
}

#[tokio::test]
async fn eth_sign_brute_forces_recovery_id() {
    let server = MockServer::start().await;
    let key = test_key(2);
    let digest = [0x33u8; 32];
    let kms = signer_with_key(&server, &key).await;
    mount_signature(&server, &der_signature(&key, &digest)).await;

    let signature = kms.eth_sign(&digest).await.unwrap();
    assert!(signature[64] == 27 || signature[64] == 28);
    // the v byte is exactly the working recovery id + 27
    let recovered = recover_signer(&digest, &signature).unwrap();
    assert_eq!(recovered, to_checksum(&address_of(key.verifying_key())));
}

#[tokio::test]
async fn eth_sign_fails_when_signature_is_from_another_key() {
    let server = MockServer::start().await;
    let key = test_key(2);
    let other = test_key(3);
    let digest = [0x44u8; 32];
    let kms = signer_with_key(&server, &key).await;
    mount_signature(&server, &der_signature(&other, &digest)).await;

    let err = kms.eth_sign(&digest).await.unwrap_err();
    assert!(err.to_string().contains("does not match"));
}

#[tokio::test]
async fn cosmos_sign_repacks_der_to_compact() {
    let server = MockServer::start().await;
    let key = test_key(4);
    let message = b"cosmos sign bytes";
    let digest: [u8; 32] = sha2::Sha256::digest(message).into();
    let kms = signer_with_key(&server, &key).await;
    mount_signature(&server, &der_signature(&key, &digest)).await;

    let signature = kms.cosmos_sign(message).await.unwrap();
    assert_eq!(signature.len(), 64);
    let parsed = Signature::from_slice(&signature).unwrap();
    assert!(parsed.normalize_s().is_none());
}

#[tokio::test]
async fn cosmos_sign_rejects_high_s_signatures() {
    let server = MockServer::start().await;
    let key = test_key(6);
    let digest = [0x55u8; 32];
    let kms = signer_with_key(&server, &key).await;

    // flip s above the half order
    let signature: Signature = key.sign_prehash(&digest).unwrap();
    let (r, s) = signature.split_scalars();
    let high = Signature::from_scalars(r.to_bytes(), (-*s).to_bytes()).unwrap();
    mount_signature(&server, high.to_der().as_bytes()).await;

    let err = kms.cosmos_sign(&digest).await.unwrap_err();
    assert!(err.to_string().contains("lower-S"));
}

#[tokio::test]
async fn destroyed_signer_refuses_to_sign() {
    let server = MockServer::start().await;
    let key = test_key(7);
    let mut kms = signer_with_key(&server, &key).await;

    kms.destroy();
    kms.destroy(); // idempotent
    let err = kms.eth_sign(&[0u8; 32]).await.unwrap_err();
    assert!(err.to_string().contains("destroyed"));
}
