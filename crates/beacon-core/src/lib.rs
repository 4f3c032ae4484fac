//! # Beacon Core
//!
//! Core types for the Beacon code-signing certificate authority: identity
//! resolution from verified OIDC claims, proof-of-possession checks, and
//! X.509 certificate shaping.
//!
//! ## Key Concepts
//!
//! - **Claims**: a signature-verified OIDC token, parsed
//! - **Principal**: a typed identity derived from claims, one flavor per
//!   configured issuer type
//! - **CertificateTemplate**: the unsigned leaf (serial, validity, SANs
//!   and provenance extensions) handed to a signing backend
//! - **Provenance extensions**: the `1.3.6.1.4.1.57264.1` arc recording
//!   where an identity came from
//!
//! Everything here is a request-scoped immutable value object; no durable
//! state lives in this crate.

pub mod challenge;
pub mod claims;
pub mod error;
pub mod extensions;
pub mod issuer;
pub mod key;
pub mod oid;
pub mod principal;
pub mod san;
pub mod template;

pub use claims::Claims;
pub use error::{CoreError, Result};
pub use extensions::ProvenanceExtensions;
pub use issuer::{ClientIds, IssuerDescriptor, IssuerKind};
pub use key::SubjectPublicKey;
pub use principal::Principal;
pub use san::{marshal_sans, marshal_username_san, unmarshal_sans, SanValue};
pub use template::{random_serial, CaProfile, CertificateTemplate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
