//! Error types for the Beacon core

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while resolving identities and shaping certificates
#[derive(Error, Debug)]
pub enum CoreError {
    /// A claim required by the issuer flavor is absent
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// A claim is present but malformed for the issuer flavor
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// The email claim is present but not verified by the issuer
    #[error("email claim is not verified")]
    UnverifiedEmail,

    /// Subject does not belong to the configured domain
    #[error("domain mismatch: expected subject under '{expected}', got '{actual}'")]
    DomainMismatch { expected: String, actual: String },

    /// Public key algorithm outside the accepted set
    #[error("unsupported public key: {0}")]
    UnsupportedKey(String),

    /// Accepted algorithm but with parameters below policy
    #[error("weak public key: {0}")]
    WeakKey(String),

    /// Proof-of-possession signature did not verify
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// SAN extension parsing failed (message text is part of the wire contract)
    #[error("{0}")]
    InvalidSan(String),

    /// Certificate template construction invariant violated
    #[error("template invariant violated: {0}")]
    TemplateInvariant(String),

    /// DER encoding/decoding error
    #[error("DER error: {0}")]
    Der(String),
}

impl From<der::Error> for CoreError {
    fn from(err: der::Error) -> Self {
        CoreError::Der(err.to_string())
    }
}
