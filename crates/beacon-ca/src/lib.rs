//! # Beacon CA
//!
//! The certificate authority service: a client presents an OIDC identity
//! token and proof of key possession; Beacon validates both, shapes an
//! X.509 code-signing certificate around the resolved identity, signs it
//! with the configured backend, optionally logs it to Certificate
//! Transparency, and returns the chain.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with issuer count
//! - `POST /v1/signing-cert` - Issue a code-signing certificate
//! - `GET /v1/trust-bundle` - Fetch the CA chain
//!
//! ## Pieces
//!
//! - [`backend::SigningBackend`] - pluggable signers (ephemeral, file,
//!   KMS, PKCS#11, Tink keyset, hosted upstream)
//! - [`ct::CtSubmitter`] - pre-cert submission and SCT embedding
//! - [`issue::IssuanceService`] - the end-to-end pipeline
//! - [`audit`] - per-issuance audit records
//!
//! The CA keeps no durable state about issued certificates; the CT log
//! is the record.

pub mod api;
pub mod audit;
pub mod backend;
pub mod config;
pub mod ct;
pub mod error;
pub mod issue;

pub use api::{create_router, AppState};
pub use audit::{AuditRecord, AuditSink, TracingAudit};
pub use backend::{
    CaKeypair, EphemeralCa, FileCa, HostedCa, KeysetUnwrapper, KmsCa, Pkcs11Ca, RemoteSigner,
    SigningBackend, TinkCa, UpstreamAuthority,
};
pub use config::{BackendConfig, CaConfig, CtConfig};
pub use ct::{AddChainResponse, CtLogClient, CtSubmitter, HttpCtLogClient, SctMode};
pub use error::{CaError, ErrorClass, Result};
pub use issue::{IssuanceRequest, IssuanceService, ProofOfPossession, SignedArtifact};
