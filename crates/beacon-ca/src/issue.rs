//! The issuance pipeline.
//!
//! One stateless pass per request: verify the token, resolve the
//! principal, check key possession, build the template, sign (via CT
//! when configured), emit an audit record. Steps are strictly sequential
//! within a request; requests run concurrently with no shared mutable
//! state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use beacon_core::{challenge, CertificateTemplate, Principal, SubjectPublicKey};
use beacon_oidc::OidcVerifier;

use crate::audit::{hex_lower, AuditRecord, AuditSink, TracingAudit};
use crate::backend::SigningBackend;
use crate::ct::CtSubmitter;
use crate::error::{CaError, Result};

/// Default whole-request deadline
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default certificate lifetime
const DEFAULT_LIFETIME_SECS: i64 = 10 * 60;

/// How the client proves possession of its private key
#[derive(Debug, Clone)]
pub enum ProofOfPossession {
    /// PKCS#10 CSR, DER; its self-signature is the proof
    Csr(Vec<u8>),
    /// Raw public key plus a signature over the principal name
    SignedChallenge {
        /// DER SubjectPublicKeyInfo
        spki_der: Vec<u8>,
        /// Signature over the UTF-8 bytes of the principal's name
        signature: Vec<u8>,
    },
}

/// An issuance request, transport-agnostic
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    pub oidc_token: String,
    pub proof: ProofOfPossession,
}

/// The issued material returned to the caller
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    /// DER chain, leaf first, root last
    pub chain_der: Vec<Vec<u8>>,
    /// Serialized SCT, present whenever a log was involved
    pub sct: Option<Vec<u8>>,
    /// True when the SCT is embedded in the leaf (it is then never also
    /// returned detached)
    pub embedded: bool,
    /// CT log id
    pub log_id: Option<Vec<u8>>,
    /// CT timestamp, ms since epoch
    pub timestamp: Option<u64>,
}

impl SignedArtifact {
    /// The leaf certificate DER
    pub fn leaf(&self) -> &[u8] {
        &self.chain_der[0]
    }
}

/// End-to-end issuance service
pub struct IssuanceService {
    verifier: Arc<OidcVerifier>,
    backend: Arc<SigningBackend>,
    ct: Option<CtSubmitter>,
    audit: Arc<dyn AuditSink>,
    lifetime: chrono::Duration,
    request_timeout: Duration,
}

impl IssuanceService {
    pub fn new(
        verifier: Arc<OidcVerifier>,
        backend: Arc<SigningBackend>,
        ct: Option<CtSubmitter>,
    ) -> Self {
        Self {
            verifier,
            backend,
            ct,
            audit: Arc::new(TracingAudit),
            lifetime: chrono::Duration::seconds(DEFAULT_LIFETIME_SECS),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the audit sink
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Override the certificate lifetime
    pub fn with_lifetime(mut self, lifetime: chrono::Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Override the per-request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The signing backend, for the trust-bundle API
    pub fn backend(&self) -> &SigningBackend {
        &self.backend
    }

    /// Run the issuance pipeline under the per-request deadline.
    /// On timeout, in-flight I/O is abandoned; no partial certificate is
    /// ever returned.
    pub async fn issue(&self, request: IssuanceRequest) -> Result<SignedArtifact> {
        tokio::time::timeout(self.request_timeout, self.issue_inner(request))
            .await
            .map_err(|_| CaError::DeadlineExceeded)?
    }

    async fn issue_inner(&self, request: IssuanceRequest) -> Result<SignedArtifact> {
        // 1-2: token verification and issuer resolution
        let (claims, descriptor) = self.verifier.verify(&request.oidc_token).await?;

        // 3: principal extraction
        let principal = Principal::from_claims(&claims, &descriptor)?;
        debug!(
            issuer = %claims.issuer,
            kind = %descriptor.kind,
            "Resolved principal"
        );

        // 4-5: key parsing and proof of possession
        let key = match &request.proof {
            ProofOfPossession::Csr(csr_der) => challenge::verify_csr(csr_der)?,
            ProofOfPossession::SignedChallenge { spki_der, signature } => {
                let key = SubjectPublicKey::from_spki_der(spki_der)?;
                challenge::verify_signed_challenge(&key, &principal, signature)?;
                key
            }
        };

        // 6: template
        let template =
            CertificateTemplate::for_principal(&principal, &key, Utc::now(), self.lifetime)?;

        // 7-8: signing, with the CT dance when a log is configured
        let artifact = match &self.ct {
            Some(submitter) => submitter.certify(&self.backend, &template).await?,
            None => SignedArtifact {
                chain_der: self.backend.sign(&template).await?,
                sct: None,
                embedded: false,
                log_id: None,
                timestamp: None,
            },
        };

        // 9: audit (never the token, never key material)
        self.audit.record(&AuditRecord {
            issuer: claims.issuer.clone(),
            subject: principal.name().to_string(),
            serial: template.serial_hex(),
            fingerprint: AuditRecord::fingerprint_of(artifact.leaf()),
            sct_log_id: artifact.log_id.as_deref().map(hex_lower),
            sct_timestamp: artifact.timestamp,
        });

        Ok(artifact)
    }
}
