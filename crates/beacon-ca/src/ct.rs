//! Certificate Transparency submission and SCT handling.
//!
//! With a log configured, the backend first signs a poison-bearing
//! pre-certificate; the log returns an SCT which is either embedded into
//! a re-signed final certificate or returned detached, per policy.
//! Submission failures classified as retriable are retried with
//! exponential backoff (base 200 ms, cap 3 s, 3 attempts total).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use beacon_core::CertificateTemplate;

use crate::backend::SigningBackend;
use crate::error::{CaError, Result};
use crate::issue::SignedArtifact;

const BACKOFF_BASE: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(3);
const MAX_ATTEMPTS: u32 = 3;

/// RFC 6962 add-chain / add-pre-chain request body
#[derive(Debug, Serialize)]
struct AddChainRequest {
    /// Base64 DER certificates, leaf first
    chain: Vec<String>,
}

/// RFC 6962 add-chain response
#[derive(Debug, Clone, Deserialize)]
pub struct AddChainResponse {
    pub sct_version: u8,
    /// Base64 log id (SHA-256 of the log key)
    pub id: String,
    /// Milliseconds since the epoch
    pub timestamp: u64,
    /// Base64 CT extensions
    #[serde(default)]
    pub extensions: String,
    /// Base64 TLS digitally-signed struct
    pub signature: String,
}

/// A CT log. The HTTP implementation posts to the log's RFC 6962
/// endpoints; tests inject fakes.
#[async_trait]
pub trait CtLogClient: Send + Sync {
    /// Submit a poison-bearing pre-certificate chain
    async fn add_pre_chain(&self, chain_der: &[Vec<u8>]) -> Result<AddChainResponse>;
    /// Submit a final certificate chain (detached-SCT flow)
    async fn add_chain(&self, chain_der: &[Vec<u8>]) -> Result<AddChainResponse>;
}

/// RFC 6962 log client over HTTP
pub struct HttpCtLogClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCtLogClient {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    async fn post(&self, endpoint: &str, chain_der: &[Vec<u8>]) -> Result<AddChainResponse> {
        let request = AddChainRequest {
            chain: chain_der.iter().map(|der| STANDARD.encode(der)).collect(),
        };
        let url = format!("{}/ct/v1/{endpoint}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CaError::BackendUnavailable(format!("CT log unreachable: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CaError::BackendUnavailable(format!(
                "CT log returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(CaError::CtSubmissionFailed(format!(
                "CT log rejected the submission: {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CaError::CtSubmissionFailed(format!("bad CT response: {e}")))
    }
}

#[async_trait]
impl CtLogClient for HttpCtLogClient {
    async fn add_pre_chain(&self, chain_der: &[Vec<u8>]) -> Result<AddChainResponse> {
        self.post("add-pre-chain", chain_der).await
    }

    async fn add_chain(&self, chain_der: &[Vec<u8>]) -> Result<AddChainResponse> {
        self.post("add-chain", chain_der).await
    }
}

/// Whether the SCT is embedded into the final certificate or returned
/// out of band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SctMode {
    #[default]
    Embedded,
    Detached,
}

/// Drives the pre-cert / SCT / final-cert dance against a configured log
pub struct CtSubmitter {
    client: Arc<dyn CtLogClient>,
    mode: SctMode,
}

impl CtSubmitter {
    pub fn new(client: Arc<dyn CtLogClient>, mode: SctMode) -> Self {
        Self { client, mode }
    }

    /// Sign and log a template, producing the final artifact.
    pub async fn certify(
        &self,
        backend: &SigningBackend,
        template: &CertificateTemplate,
    ) -> Result<SignedArtifact> {
        match self.mode {
            SctMode::Embedded => self.certify_embedded(backend, template).await,
            SctMode::Detached => self.certify_detached(backend, template).await,
        }
    }

    async fn certify_embedded(
        &self,
        backend: &SigningBackend,
        template: &CertificateTemplate,
    ) -> Result<SignedArtifact> {
        let precert = template.precert()?;
        let pre_chain = backend.sign(&precert).await?;

        let response = self
            .submit_with_retry(|| self.client.add_pre_chain(&pre_chain))
            .await?;
        debug!(timestamp = response.timestamp, "Obtained SCT for pre-certificate");

        let sct = serialize_sct(&response)?;
        let final_template = template.with_embedded_sct(sct_list(&sct))?;
        let chain = backend.sign(&final_template).await?;

        Ok(SignedArtifact {
            chain_der: chain,
            sct: Some(sct),
            embedded: true,
            log_id: Some(decode_log_id(&response)?),
            timestamp: Some(response.timestamp),
        })
    }

    async fn certify_detached(
        &self,
        backend: &SigningBackend,
        template: &CertificateTemplate,
    ) -> Result<SignedArtifact> {
        let chain = backend.sign(template).await?;
        let response = self
            .submit_with_retry(|| self.client.add_chain(&chain))
            .await?;
        let sct = serialize_sct(&response)?;

        Ok(SignedArtifact {
            chain_der: chain,
            sct: Some(sct),
            embedded: false,
            log_id: Some(decode_log_id(&response)?),
            timestamp: Some(response.timestamp),
        })
    }

    async fn submit_with_retry<F, Fut>(&self, attempt: F) -> Result<AddChainResponse>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<AddChainResponse>>,
    {
        let mut delay = BACKOFF_BASE;
        let mut last_error = None;
        for round in 1..=MAX_ATTEMPTS {
            match attempt().await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retriable() && round < MAX_ATTEMPTS => {
                    warn!(attempt = round, error = %err, "CT submission failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(BACKOFF_CAP);
                    last_error = Some(err);
                }
                Err(err) => {
                    return Err(CaError::CtSubmissionFailed(err.to_string()));
                }
            }
        }
        Err(CaError::CtSubmissionFailed(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

/// TLS-serialize an SCT per RFC 6962 §3.2:
/// version, log id, timestamp, extensions, digitally-signed struct.
fn serialize_sct(response: &AddChainResponse) -> Result<Vec<u8>> {
    if response.sct_version != 0 {
        return Err(CaError::CtSubmissionFailed(format!(
            "unsupported SCT version {}",
            response.sct_version
        )));
    }
    let log_id = decode_log_id(response)?;
    let extensions = STANDARD
        .decode(&response.extensions)
        .map_err(|e| CaError::CtSubmissionFailed(format!("bad SCT extensions: {e}")))?;
    let signature = STANDARD
        .decode(&response.signature)
        .map_err(|e| CaError::CtSubmissionFailed(format!("bad SCT signature: {e}")))?;
    let ext_len = u16::try_from(extensions.len())
        .map_err(|_| CaError::CtSubmissionFailed("SCT extensions too long".into()))?;

    let mut sct = Vec::with_capacity(1 + 32 + 8 + 2 + extensions.len() + signature.len());
    sct.push(0); // v1
    sct.extend_from_slice(&log_id);
    sct.extend_from_slice(&response.timestamp.to_be_bytes());
    sct.extend_from_slice(&ext_len.to_be_bytes());
    sct.extend_from_slice(&extensions);
    sct.extend_from_slice(&signature);
    Ok(sct)
}

/// Wrap one serialized SCT into a SignedCertificateTimestampList
fn sct_list(sct: &[u8]) -> Vec<u8> {
    let entry_len = sct.len() as u16;
    let mut list = Vec::with_capacity(sct.len() + 4);
    list.extend_from_slice(&(entry_len + 2).to_be_bytes());
    list.extend_from_slice(&entry_len.to_be_bytes());
    list.extend_from_slice(sct);
    list
}

fn decode_log_id(response: &AddChainResponse) -> Result<Vec<u8>> {
    let id = STANDARD
        .decode(&response.id)
        .map_err(|e| CaError::CtSubmissionFailed(format!("bad CT log id: {e}")))?;
    if id.len() != 32 {
        return Err(CaError::CtSubmissionFailed(format!(
            "CT log id is {} bytes, expected 32",
            id.len()
        )));
    }
    Ok(id)
}
