//! Signing-certificate issuance handler.

use axum::{extract::State, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::backend::der_chain_to_pem;
use crate::error::CaError;
use crate::issue::{IssuanceRequest, ProofOfPossession};

/// Credentials carried in the request
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Compact-serialized OIDC identity token
    pub oidc_token: String,
}

/// A raw public key submission
#[derive(Debug, Deserialize)]
pub struct PublicKeyRequest {
    /// Advisory algorithm label; the key itself is authoritative
    #[serde(default)]
    pub algorithm: Option<String>,
    /// PEM `PUBLIC KEY` block or base64 DER SubjectPublicKeyInfo
    pub content: String,
}

/// Request to issue a signing certificate.
///
/// Exactly one of `public_key` and `certificate_signing_request` must be
/// present; `proof_of_possession` is required with `public_key`.
#[derive(Debug, Deserialize)]
pub struct CreateCertificateRequest {
    pub credentials: Credentials,
    #[serde(default)]
    pub public_key: Option<PublicKeyRequest>,
    /// PEM `CERTIFICATE REQUEST` block or base64 DER PKCS#10
    #[serde(default)]
    pub certificate_signing_request: Option<String>,
    /// Base64 signature over the principal name (public-key path)
    #[serde(default)]
    pub proof_of_possession: Option<String>,
}

/// One certificate chain in the response
#[derive(Debug, Serialize)]
pub struct CertificateChain {
    /// PEM certificates, leaf first, root last
    pub chain: Vec<String>,
    /// Base64 serialized SCT (detached flow only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_certificate_timestamp: Option<String>,
}

/// Issuance response: exactly one variant is set
#[derive(Debug, Serialize)]
pub struct SigningCertificateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_certificate_embedded_sct: Option<CertificateChain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_certificate_detached_sct: Option<CertificateChain>,
}

/// Issue a code-signing certificate
///
/// POST /v1/signing-cert
pub async fn create_signing_certificate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCertificateRequest>,
) -> Result<Json<SigningCertificateResponse>, ApiError> {
    let proof = proof_from_request(&request)?;

    let artifact = state
        .service
        .issue(IssuanceRequest {
            oidc_token: request.credentials.oidc_token,
            proof,
        })
        .await?;

    let chain = der_chain_to_pem(&artifact.chain_der)?;
    let response = if artifact.embedded {
        SigningCertificateResponse {
            signed_certificate_embedded_sct: Some(CertificateChain {
                chain,
                signed_certificate_timestamp: None,
            }),
            signed_certificate_detached_sct: None,
        }
    } else {
        SigningCertificateResponse {
            signed_certificate_embedded_sct: None,
            signed_certificate_detached_sct: Some(CertificateChain {
                chain,
                signed_certificate_timestamp: artifact.sct.as_deref().map(|sct| STANDARD.encode(sct)),
            }),
        }
    };
    Ok(Json(response))
}

fn proof_from_request(request: &CreateCertificateRequest) -> Result<ProofOfPossession, ApiError> {
    match (&request.public_key, &request.certificate_signing_request) {
        (Some(public_key), None) => {
            let spki_der = decode_block(&public_key.content, "PUBLIC KEY")?;
            let proof = request.proof_of_possession.as_deref().ok_or_else(|| {
                CaError::InvalidRequest(
                    "proof_of_possession is required with a raw public key".into(),
                )
            })?;
            let signature = STANDARD.decode(proof).map_err(|e| {
                CaError::InvalidRequest(format!("proof_of_possession is not base64: {e}"))
            })?;
            Ok(ProofOfPossession::SignedChallenge { spki_der, signature })
        }
        (None, Some(csr)) => Ok(ProofOfPossession::Csr(decode_block(
            csr,
            "CERTIFICATE REQUEST",
        )?)),
        _ => Err(CaError::InvalidRequest(
            "exactly one of public_key and certificate_signing_request must be set".into(),
        )
        .into()),
    }
}

/// Accept either a PEM block of the expected label or base64 DER
fn decode_block(content: &str, expected_label: &str) -> Result<Vec<u8>, ApiError> {
    if content.contains("-----BEGIN") {
        let (label, doc) = der::Document::from_pem(content)
            .map_err(|e| CaError::InvalidRequest(format!("bad PEM: {e}")))?;
        if label != expected_label {
            return Err(CaError::InvalidRequest(format!(
                "expected a {expected_label} block, got {label}"
            ))
            .into());
        }
        Ok(doc.into_vec())
    } else {
        Ok(STANDARD
            .decode(content.trim())
            .map_err(|e| CaError::InvalidRequest(format!("content is not base64: {e}")))?)
    }
}
