//! File-backed CA: persistent chain and signing key loaded from disk.

use std::path::Path;

use x509_cert::Certificate;

use beacon_core::CertificateTemplate;

use crate::backend::keypair::{CaKeypair, LocalMaterial};
use crate::error::{CaError, Result};

/// CA whose chain and PKCS#8 signing key live on disk. Encrypted keys
/// are unlocked with a password at load time.
#[derive(Debug)]
pub struct FileCa {
    material: LocalMaterial,
}

impl FileCa {
    /// Load the PEM certificate chain (signer first, root last) and the
    /// signing key.
    pub fn load(
        cert_chain_path: &Path,
        key_path: &Path,
        key_password: Option<&str>,
    ) -> Result<Self> {
        let chain_pem = std::fs::read(cert_chain_path).map_err(|e| {
            CaError::Config(format!(
                "cannot read CA chain {}: {e}",
                cert_chain_path.display()
            ))
        })?;
        let chain = Certificate::load_pem_chain(&chain_pem)
            .map_err(|e| CaError::Config(format!("bad CA chain PEM: {e}")))?;

        let key_pem = std::fs::read_to_string(key_path).map_err(|e| {
            CaError::Config(format!("cannot read CA key {}: {e}", key_path.display()))
        })?;
        let keypair = CaKeypair::from_pkcs8_pem(&key_pem, key_password)?;

        Ok(Self {
            material: LocalMaterial::new(keypair, chain)?,
        })
    }

    pub(crate) fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        self.material.sign(template)
    }

    pub(crate) fn bundle(&self) -> Result<Vec<String>> {
        self.material.bundle()
    }
}
