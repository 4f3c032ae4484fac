//! Remote-key backends: the cryptographic operation happens outside the
//! process (cloud KMS, HSM). The vendor protocol is a collaborator
//! behind the [`RemoteSigner`] trait; this module owns TBS assembly and
//! chain handling.

use async_trait::async_trait;
use der::asn1::BitString;
use der::{Encode, EncodePem};
use sha2::{Digest, Sha256};
use x509_cert::Certificate;

use beacon_core::{CaProfile, CertificateTemplate};

use crate::error::{CaError, Result};

/// A signing oracle whose private key never enters this process.
///
/// `sign_digest` receives the SHA-256 digest of the TBSCertificate and
/// returns a signature matching `signature_algorithm()` (DER-encoded for
/// ECDSA). Implementations surface vendor throttling as
/// [`CaError::BackendUnavailable`] and unprovisioned keys as
/// [`CaError::KeyNotReady`]; they must be safe for concurrent use.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// The X.509 signature algorithm the remote key produces
    fn signature_algorithm(&self) -> x509_cert::spki::AlgorithmIdentifierOwned;

    /// Sign a 32-byte SHA-256 digest
    async fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>>;
}

/// Shared implementation for KMS- and HSM-backed CAs
#[derive(Clone)]
pub(crate) struct RemoteMaterial {
    signer: std::sync::Arc<dyn RemoteSigner>,
    /// Signer certificate first, root last
    chain: Vec<Certificate>,
    profile: CaProfile,
}

impl RemoteMaterial {
    pub fn new(signer: std::sync::Arc<dyn RemoteSigner>, chain_pem: &[u8]) -> Result<Self> {
        let chain = Certificate::load_pem_chain(chain_pem)
            .map_err(|e| CaError::Config(format!("bad CA chain PEM: {e}")))?;
        let signer_cert = chain
            .first()
            .ok_or_else(|| CaError::Config("CA chain is empty".into()))?;

        let key_id = sha1::Sha1::digest(
            signer_cert
                .tbs_certificate
                .subject_public_key_info
                .subject_public_key
                .raw_bytes(),
        )
        .to_vec();

        let profile = CaProfile {
            issuer_name: signer_cert.tbs_certificate.subject.clone(),
            authority_key_id: Some(key_id),
            signature_algorithm: signer.signature_algorithm(),
        };

        Ok(Self {
            signer,
            chain,
            profile,
        })
    }

    pub async fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        let tbs = template.to_tbs(&self.profile).map_err(CaError::from)?;
        let tbs_der = tbs.to_der()?;
        let digest = Sha256::digest(&tbs_der);

        let signature = self.signer.sign_digest(&digest).await?;
        let leaf = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: self.signer.signature_algorithm(),
            signature: BitString::from_bytes(&signature)?,
        };

        let mut chain_der = Vec::with_capacity(1 + self.chain.len());
        chain_der.push(leaf.to_der()?);
        for cert in &self.chain {
            chain_der.push(cert.to_der()?);
        }
        Ok(chain_der)
    }

    pub fn bundle(&self) -> Result<Vec<String>> {
        self.chain
            .iter()
            .map(|cert| {
                cert.to_pem(der::pem::LineEnding::LF)
                    .map_err(|e| CaError::Internal(format!("PEM encoding: {e}")))
            })
            .collect()
    }
}

/// CA whose signing key resides in a cloud KMS
pub struct KmsCa {
    material: RemoteMaterial,
}

impl KmsCa {
    pub fn new(signer: std::sync::Arc<dyn RemoteSigner>, chain_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            material: RemoteMaterial::new(signer, chain_pem)?,
        })
    }

    pub(crate) async fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        self.material.sign(template).await
    }

    pub(crate) fn bundle(&self) -> Result<Vec<String>> {
        self.material.bundle()
    }
}
