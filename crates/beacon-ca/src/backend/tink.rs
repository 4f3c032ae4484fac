//! Tink keyset backend: the signing key is stored as an encrypted keyset
//! and AEAD-unwrapped through a KMS at startup.
//!
//! Keyset-proto handling is the unwrapper's concern; the unwrapped
//! plaintext handed back here is a PKCS#8 private key document.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use x509_cert::Certificate;

use beacon_core::CertificateTemplate;

use crate::backend::keypair::{CaKeypair, LocalMaterial};
use crate::error::{CaError, Result};

/// AEAD-unwraps an encrypted keyset via a key-management service
#[async_trait]
pub trait KeysetUnwrapper: Send + Sync {
    /// Decrypt the keyset ciphertext; returns PKCS#8 DER
    async fn unwrap_keyset(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct EncryptedKeyset {
    #[serde(rename = "encryptedKeyset")]
    encrypted_keyset: String,
}

/// CA signing with a key unwrapped from a Tink keyset. After the one-time
/// unwrap the backend signs in process, like the file CA.
#[derive(Debug)]
pub struct TinkCa {
    material: LocalMaterial,
}

impl TinkCa {
    /// Parse the keyset file contents, unwrap through the KMS, and pair
    /// the key with the PEM chain.
    pub async fn load(
        keyset_json: &str,
        unwrapper: &dyn KeysetUnwrapper,
        chain_pem: &[u8],
    ) -> Result<Self> {
        let keyset: EncryptedKeyset = serde_json::from_str(keyset_json)
            .map_err(|e| CaError::Config(format!("bad keyset file: {e}")))?;
        let ciphertext = STANDARD
            .decode(&keyset.encrypted_keyset)
            .map_err(|e| CaError::Config(format!("bad keyset encoding: {e}")))?;

        let pkcs8_der = unwrapper.unwrap_keyset(&ciphertext).await?;
        let keypair = CaKeypair::from_pkcs8_der(&pkcs8_der)?;

        let chain = Certificate::load_pem_chain(chain_pem)
            .map_err(|e| CaError::Config(format!("bad CA chain PEM: {e}")))?;

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
