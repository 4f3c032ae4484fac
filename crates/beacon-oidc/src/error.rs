//! Error types for OIDC verification

use thiserror::Error;

/// Result type for OIDC verification operations
pub type Result<T> = std::result::Result<T, OidcError>;

/// Errors that can occur while verifying an identity token
#[derive(Error, Debug)]
pub enum OidcError {
    /// Token is malformed or fails structural validation
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token signature does not verify under the issuer's keys
    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    /// Token has expired
    #[error("token expired: {0}")]
    Expired(String),

    /// No configured issuer matches the token's `iss`
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// `aud` does not contain any configured client id
    #[error("audience mismatch: {0}")]
    AudienceMismatch(String),

    /// Signing keys could not be resolved (transient)
    #[error("key resolution failed: {0}")]
    KeyResolutionFailed(String),

    /// JWS algorithm outside the accepted set
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Two registered issuers would match the same token
    #[error("duplicate issuer registration: {0}")]
    DuplicateIssuer(String),
}

impl From<jsonwebtoken::errors::Error> for OidcError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => OidcError::Expired("token is past its expiry".into()),
            ErrorKind::InvalidSignature => OidcError::InvalidSignature(err.to_string()),
            ErrorKind::InvalidAudience => {
                OidcError::AudienceMismatch("token audience does not include a configured client id".into())
            }
            ErrorKind::InvalidAlgorithm => OidcError::UnsupportedAlgorithm(err.to_string()),
            _ => OidcError::InvalidToken(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for OidcError {
    fn from(err: reqwest::Error) -> Self {
        OidcError::KeyResolutionFailed(err.to_string())
    }
}
