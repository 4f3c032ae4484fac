//! PKCS#11 HSM backend: identical shape to the KMS backend, with the
//! HSM session as the cryptographic oracle.

use std::sync::Arc;

use beacon_core::CertificateTemplate;

use crate::backend::kms::{RemoteMaterial, RemoteSigner};
use crate::error::Result;

/// CA whose signing key lives in an HSM reached over PKCS#11
pub struct Pkcs11Ca {
    material: RemoteMaterial,
}

impl Pkcs11Ca {
    pub fn new(session: Arc<dyn RemoteSigner>, chain_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            material: RemoteMaterial::new(session, chain_pem)?,
        })
    }

    pub(crate) async fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        self.material.sign(template).await
    }

    pub(crate) fn bundle(&self) -> Result<Vec<String>> {
        self.material.bundle()
    }
}
