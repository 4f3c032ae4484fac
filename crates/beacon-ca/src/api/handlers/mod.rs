//! Request handlers for the CA API

mod bundle;
mod issue;

pub use bundle::{get_trust_bundle, TrustBundleResponse};
pub use issue::{
    create_signing_certificate, CertificateChain, CreateCertificateRequest, Credentials,
    PublicKeyRequest, SigningCertificateResponse,
};
