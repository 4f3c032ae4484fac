//! Pluggable signing backends.
//!
//! A closed set of variants, each owning its own key state. Every
//! backend signs a [`CertificateTemplate`] into a DER chain (leaf first,
//! root last), supports the pre-certificate rendering, exposes its trust
//! bundle, and is safe for concurrent signing.

mod ephemeral;
mod file;
mod hosted;
mod keypair;
mod kms;
mod pkcs11;
mod tink;

pub use ephemeral::EphemeralCa;
pub use file::FileCa;
pub use hosted::{HostedCa, UpstreamAuthority};
pub use keypair::CaKeypair;
pub use kms::{KmsCa, RemoteSigner};
pub use pkcs11::Pkcs11Ca;
pub use tink::{KeysetUnwrapper, TinkCa};

use der::{Decode, EncodePem};
use x509_cert::Certificate;

use beacon_core::CertificateTemplate;

use crate::error::{CaError, Result};

/// The configured signing backend
pub enum SigningBackend {
    /// RAM-only root + intermediate, minted at startup
    Ephemeral(EphemeralCa),
    /// Persistent chain and key on disk
    File(FileCa),
    /// Key held by a cloud KMS
    Kms(KmsCa),
    /// Key held by an HSM behind PKCS#11
    Pkcs11(Pkcs11Ca),
    /// Key unwrapped from an encrypted Tink keyset
    Tink(TinkCa),
    /// Delegation to an upstream hosted CA
    Hosted(HostedCa),
}

impl SigningBackend {
    /// Sign a template; returns the DER chain, leaf first, root last.
    pub async fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        match self {
            SigningBackend::Ephemeral(ca) => ca.sign(template),
            SigningBackend::File(ca) => ca.sign(template),
            SigningBackend::Kms(ca) => ca.sign(template).await,
            SigningBackend::Pkcs11(ca) => ca.sign(template).await,
            SigningBackend::Tink(ca) => ca.sign(template),
            SigningBackend::Hosted(ca) => ca.sign(template).await,
        }
    }

    /// The CA chain in PEM (signer first, root last), served by the
    /// trust-bundle API.
    pub fn root_bundle(&self) -> Result<Vec<String>> {
        match self {
            SigningBackend::Ephemeral(ca) => ca.bundle(),
            SigningBackend::File(ca) => ca.bundle(),
            SigningBackend::Kms(ca) => ca.bundle(),
            SigningBackend::Pkcs11(ca) => ca.bundle(),
            SigningBackend::Tink(ca) => ca.bundle(),
            SigningBackend::Hosted(ca) => ca.bundle(),
        }
    }

    /// The root certificate's DER, last element of the bundle.
    pub fn root_public_bytes(&self) -> Result<Vec<u8>> {
        let bundle = self.root_bundle()?;
        let root_pem = bundle
            .last()
            .ok_or_else(|| CaError::Internal("backend produced an empty bundle".into()))?;
        let (_, der) = der::Document::from_pem(root_pem)
            .map_err(|e| CaError::Internal(format!("bad bundle PEM: {e}")))?;
        Ok(der.into_vec())
    }
}

/// Re-encode a DER chain as PEM blocks
pub fn der_chain_to_pem(chain: &[Vec<u8>]) -> Result<Vec<String>> {
    chain
        .iter()
        .map(|der| {
            let cert = Certificate::from_der(der)?;
            cert.to_pem(der::pem::LineEnding::LF)
                .map_err(|e| CaError::Internal(format!("PEM encoding: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use spki::EncodePublicKey;

    use beacon_core::{Claims, IssuerDescriptor, IssuerKind, Principal, SubjectPublicKey};

    fn email_template() -> CertificateTemplate {
        let raw = json!({ "email": "alice@example.com", "email_verified": true });
        let claims = Claims {
            issuer: "https://accounts.google.com".into(),
            subject: "1234".into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        };
        let descriptor =
            IssuerDescriptor::new("https://accounts.google.com", "beacon", IssuerKind::Email);
        let principal = Principal::from_claims(&claims, &descriptor).unwrap();

        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let spki = sk.verifying_key().to_public_key_der().unwrap();
        let key = SubjectPublicKey::from_spki_der(spki.as_bytes()).unwrap();

        CertificateTemplate::for_principal(&principal, &key, Utc::now(), Duration::minutes(10))
            .unwrap()
    }

    #[tokio::test]
    async fn test_ephemeral_signs_three_cert_chain() {
        let backend = SigningBackend::Ephemeral(EphemeralCa::new().unwrap());
        let chain = backend.sign(&email_template()).await.unwrap();
        assert_eq!(chain.len(), 3);

        let leaf = Certificate::from_der(&chain[0]).unwrap();
        let intermediate = Certificate::from_der(&chain[1]).unwrap();
        assert_eq!(leaf.tbs_certificate.issuer, intermediate.tbs_certificate.subject);
    }

    #[tokio::test]
    async fn test_concurrent_signing() {
        let backend =
            std::sync::Arc::new(SigningBackend::Ephemeral(EphemeralCa::new().unwrap()));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend.sign(&email_template()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[test]
    fn test_root_public_bytes_matches_bundle_tail() {
        let backend = SigningBackend::Ephemeral(EphemeralCa::new().unwrap());
        let root_der = backend.root_public_bytes().unwrap();
        let root = Certificate::from_der(&root_der).unwrap();
        assert_eq!(root.tbs_certificate.issuer, root.tbs_certificate.subject);
    }
}
