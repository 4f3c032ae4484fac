//! CA-level errors and the stable error taxonomy.

use thiserror::Error;

use beacon_core::CoreError;
use beacon_oidc::OidcError;

/// Result type for CA operations
pub type Result<T> = std::result::Result<T, CaError>;

/// The four response classes every error maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed request material (400)
    InvalidInput,
    /// Identity could not be established (401)
    Unauthorized,
    /// Transient collaborator failure; the caller may retry (503)
    BackendTransient,
    /// A bug: invariant violations, signing failures (500)
    Internal,
}

/// Errors from the issuance pipeline.
///
/// Messages never carry private key material, raw tokens, or JWKS
/// contents.
#[derive(Error, Debug)]
pub enum CaError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Oidc(#[from] OidcError),

    /// The backend could not produce a signature
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// The backend is temporarily unreachable
    #[error("signing backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend's key material is not yet usable
    #[error("signing key not ready: {0}")]
    KeyNotReady(String),

    /// CT submission failed after retries were exhausted
    #[error("certificate transparency submission failed: {0}")]
    CtSubmissionFailed(String),

    /// The per-request deadline elapsed
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The request body doesn't satisfy the API contract
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Bad configuration detected at startup or reload
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CaError {
    /// The taxonomy class for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            CaError::Core(core) => match core {
                CoreError::UnverifiedEmail | CoreError::DomainMismatch { .. } => {
                    ErrorClass::Unauthorized
                }
                CoreError::TemplateInvariant(_) => ErrorClass::Internal,
                _ => ErrorClass::InvalidInput,
            },
            CaError::Oidc(oidc) => match oidc {
                OidcError::InvalidToken(_) | OidcError::UnsupportedAlgorithm(_) => {
                    ErrorClass::InvalidInput
                }
                OidcError::InvalidSignature(_)
                | OidcError::Expired(_)
                | OidcError::UnknownIssuer(_)
                | OidcError::AudienceMismatch(_) => ErrorClass::Unauthorized,
                OidcError::KeyResolutionFailed(_) => ErrorClass::BackendTransient,
                OidcError::DuplicateIssuer(_) => ErrorClass::Internal,
            },
            CaError::InvalidRequest(_) => ErrorClass::InvalidInput,
            CaError::BackendUnavailable(_)
            | CaError::KeyNotReady(_)
            | CaError::CtSubmissionFailed(_)
            | CaError::DeadlineExceeded => ErrorClass::BackendTransient,
            CaError::SigningFailed(_) | CaError::Config(_) | CaError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// A stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            CaError::Core(core) => match core {
                CoreError::MissingClaim(_) => "MISSING_CLAIM",
                CoreError::InvalidClaims(_) => "INVALID_CLAIMS",
                CoreError::UnverifiedEmail => "UNVERIFIED_EMAIL",
                CoreError::DomainMismatch { .. } => "DOMAIN_MISMATCH",
                CoreError::UnsupportedKey(_) => "UNSUPPORTED_KEY",
                CoreError::WeakKey(_) => "WEAK_KEY",
                CoreError::InvalidSignature(_) => "INVALID_SIGNATURE",
                CoreError::InvalidSan(_) => "INVALID_SAN",
                CoreError::TemplateInvariant(_) => "INTERNAL_ERROR",
                CoreError::Der(_) => "INVALID_ENCODING",
            },
            CaError::Oidc(oidc) => match oidc {
                OidcError::InvalidToken(_) => "INVALID_TOKEN",
                OidcError::InvalidSignature(_) => "INVALID_TOKEN_SIGNATURE",
                OidcError::Expired(_) => "TOKEN_EXPIRED",
                OidcError::UnknownIssuer(_) => "UNKNOWN_ISSUER",
                OidcError::AudienceMismatch(_) => "AUDIENCE_MISMATCH",
                OidcError::KeyResolutionFailed(_) => "KEY_RESOLUTION_FAILED",
                OidcError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
                OidcError::DuplicateIssuer(_) => "INTERNAL_ERROR",
            },
            CaError::SigningFailed(_) => "SIGNING_FAILED",
            CaError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            CaError::KeyNotReady(_) => "KEY_NOT_READY",
            CaError::CtSubmissionFailed(_) => "CT_SUBMISSION_FAILED",
            CaError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            CaError::InvalidRequest(_) => "INVALID_REQUEST",
            CaError::Config(_) => "CONFIGURATION_ERROR",
            CaError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller-side retry could plausibly succeed
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::BackendTransient
    }
}

impl From<der::Error> for CaError {
    fn from(err: der::Error) -> Self {
        CaError::Internal(format!("DER error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_classes() {
        assert_eq!(
            CaError::from(CoreError::UnverifiedEmail).class(),
            ErrorClass::Unauthorized
        );
        assert_eq!(
            CaError::from(CoreError::UnsupportedKey("x".into())).class(),
            ErrorClass::InvalidInput
        );
        assert_eq!(
            CaError::from(OidcError::Expired("x".into())).class(),
            ErrorClass::Unauthorized
        );
        assert_eq!(
            CaError::from(OidcError::KeyResolutionFailed("x".into())).class(),
            ErrorClass::BackendTransient
        );
        assert_eq!(
            CaError::SigningFailed("x".into()).class(),
            ErrorClass::Internal
        );
        assert!(CaError::BackendUnavailable("x".into()).is_retriable());
        assert!(!CaError::SigningFailed("x".into()).is_retriable());
    }
}
