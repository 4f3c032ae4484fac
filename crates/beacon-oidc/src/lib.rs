//! # Beacon OIDC
//!
//! Token verification for the Beacon certificate authority:
//! - **Issuer registry**: exact and wildcard issuer matching with a
//!   documented precedence (exact first, then longest literal prefix,
//!   ties by registration order)
//! - **JWKS cache**: per-issuer key sets with provider-declared TTLs and
//!   single-flight refresh
//! - **Verifier**: two-pass token decode with signature, expiry and
//!   audience checks, plus federated `issuer_claim` re-derivation

pub mod error;
pub mod jwks;
pub mod registry;
pub mod verifier;

pub use error::{OidcError, Result};
pub use jwks::{HttpKeySetFetcher, JwksCache, KeySetFetcher};
pub use registry::IssuerRegistry;
pub use verifier::OidcVerifier;
