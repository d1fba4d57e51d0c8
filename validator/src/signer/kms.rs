//! Remote signer backed by a Cloud KMS HSM key.
//!
//! The key never leaves the HSM; the signer holds its resource name and
//! talks to the KMS REST API. Construction validates the key algorithm,
//! fetches the SPKI public key, and derives both chain identities from it.
//! KMS returns ASN.1 DER `{r, s}` signatures; `eth_sign` brute-forces the
//! recovery id against the known address, `cosmos_sign` re-packs to compact
//! form, enforces low-S, and self-verifies before returning.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::pkcs8::DecodePublicKey;
use serde::Deserialize;

use super::local::{cosmos_digest, eth_digest};
use super::SignerError;
use crate::cosmos::CosmosPublicKey;
use crate::eth::eip712::address_of;

/// Key algorithm the vault keys must use
const REQUIRED_ALGORITHM: &str = "EC_SIGN_SECP256K1_SHA256";

const DEFAULT_KMS_BASE_URL: &str = "https://cloudkms.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// ============================================================================
// KMS REST CLIENT
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CryptoKeyVersion {
    pub algorithm: String,
}

#[derive(Debug, Deserialize)]
pub struct KmsPublicKey {
    pub pem: String,
}

#[derive(Debug, Deserialize)]
struct AsymmetricSignResponse {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Minimal client for the Cloud KMS REST API.
#[derive(Debug, Clone)]
pub struct KmsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl KmsClient {
    /// Connects with a bearer token from `GOOGLE_OAUTH_ACCESS_TOKEN` or,
    /// failing that, the GCE metadata server.
    pub async fn connect() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let token = match std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            Ok(token) if !token.is_empty() => token,
            _ => {
                let response: MetadataToken = http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .context("Failed to reach metadata server for KMS token")?
                    .json()
                    .await
                    .context("Failed to parse metadata token response")?;
                response.access_token
            }
        };

        Ok(Self {
            http,
            base_url: DEFAULT_KMS_BASE_URL.to_string(),
            token,
        })
    }

    /// Client against an explicit endpoint, used by tests.
    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .context("Failed to create HTTP client")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("KMS error from {}: {} ({})", url, status, body));
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    pub async fn get_crypto_key_version(&self, key_name: &str) -> Result<CryptoKeyVersion> {
        self.get_json(key_name).await
    }

    pub async fn get_public_key(&self, key_name: &str) -> Result<KmsPublicKey> {
        self.get_json(&format!("{}/publicKey", key_name)).await
    }

    /// Signs a 32-byte digest, returning the ASN.1 DER `{r, s}` signature.
    pub async fn asymmetric_sign(&self, key_name: &str, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let url = format!("{}/{}:asymmetricSign", self.base_url, key_name);
        let body = serde_json::json!({
            "digest": { "sha256": general_purpose::STANDARD.encode(digest) }
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("KMS error from {}: {} ({})", url, status, text));
        }
        let parsed: AsymmetricSignResponse = response
            .json()
            .await
            .context("Failed to parse asymmetricSign response")?;
        general_purpose::STANDARD
            .decode(parsed.signature)
            .context("KMS signature is not valid base64")
    }
}

// ============================================================================
// KMS SIGNER
// ============================================================================

#[derive(Debug)]
pub struct GcpKmsSigner {
    /// Remote handle; `None` once destroyed
    client: Option<KmsClient>,
    key_name: String,
    eth_address: [u8; 20],
    cosmos_public_key: CosmosPublicKey,
    verifying_key: VerifyingKey,
}

impl GcpKmsSigner {
    /// Connects to KMS and binds to the given key version resource name.
    pub async fn new(key_name: &str) -> Result<Self> {
        let client = KmsClient::connect().await?;
        Self::with_client(client, key_name).await
    }

    /// Binds to a key through an existing client, used by tests.
    pub async fn with_client(client: KmsClient, key_name: &str) -> Result<Self> {
        let version = client
            .get_crypto_key_version(key_name)
            .await
            .context("Failed to get key version details")?;
        if version.algorithm != REQUIRED_ALGORITHM {
            return Err(anyhow::anyhow!(
                "Key algorithm is {}, not {}",
                version.algorithm,
                REQUIRED_ALGORITHM
            ));
        }

        let public_key = client
            .get_public_key(key_name)
            .await
            .context("Failed to fetch public key")?;
        let key = k256::PublicKey::from_public_key_pem(&public_key.pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse SPKI public key PEM: {}", e))?;
        let verifying_key = VerifyingKey::from(key);

        Ok(Self {
            client: Some(client),
            key_name: key_name.to_string(),
            eth_address: address_of(&verifying_key),
            cosmos_public_key: CosmosPublicKey::from_verifying_key(&verifying_key),
            verifying_key,
        })
    }

    fn client(&self) -> Result<&KmsClient> {
        self.client.as_ref().ok_or_else(|| SignerError::Destroyed.into())
    }

    pub async fn eth_sign(&self, data: &[u8]) -> Result<[u8; 65]> {
        let digest = eth_digest(data);
        let der = self
            .client()?
            .asymmetric_sign(&self.key_name, &digest)
            .await?;
        let signature =
            Signature::from_der(&der).context("KMS signature is not valid ASN.1 DER")?;
        let signature = signature.normalize_s().unwrap_or(signature);

        for recovery_byte in 0u8..2 {
            let recovery_id = RecoveryId::from_byte(recovery_byte)
                .expect("recovery bytes 0 and 1 are always valid");
            let Ok(recovered) = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
            else {
                continue;
            };
            if address_of(&recovered) == self.eth_address {
                let mut out = [0u8; 65];
                out[..64].copy_from_slice(&signature.to_bytes());
                out[64] = recovery_byte + 27;
                return Ok(out);
            }
        }

        Err(SignerError::AddressMismatch.into())
    }

    pub async fn cosmos_sign(&self, data: &[u8]) -> Result<[u8; 64]> {
        let digest = cosmos_digest(data);
        let der = self
            .client()?
            .asymmetric_sign(&self.key_name, &digest)
            .await?;
        let signature =
            Signature::from_der(&der).context("KMS signature is not valid ASN.1 DER")?;
        if signature.normalize_s().is_some() {
            return Err(SignerError::NotLowS.into());
        }

        self.verifying_key
            .verify_prehash(&digest, &signature)
            .map_err(|_| anyhow::anyhow!("Signature failed self-verification"))?;

        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    pub fn eth_address(&self) -> [u8; 20] {
        self.eth_address
    }

    pub fn cosmos_public_key(&self) -> CosmosPublicKey {
        self.cosmos_public_key
    }

    /// Drops the remote handle. Idempotent.
    pub fn destroy(&mut self) {
        self.client = None;
    }
}
