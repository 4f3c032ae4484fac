//! Configuration snapshot for the CA service.
//!
//! Loaded from JSON by the binary (or handed in programmatically) and
//! consumed as an immutable snapshot; on reload the registry is rebuilt
//! and swapped atomically. The remote backends (KMS, PKCS#11, Tink,
//! hosted) need injected collaborators and are wired up through the
//! library API rather than the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use beacon_core::IssuerDescriptor;
use beacon_oidc::IssuerRegistry;

use crate::backend::{EphemeralCa, FileCa, SigningBackend};
use crate::ct::SctMode;
use crate::error::{CaError, Result};

fn default_lifetime_secs() -> u64 {
    600
}

/// Top-level configuration
#[derive(Debug, Deserialize)]
pub struct CaConfig {
    /// Exact-match issuers, keyed by issuer URL
    #[serde(default)]
    pub oidc_issuers: BTreeMap<String, IssuerDescriptor>,

    /// Wildcard issuers, keyed by pattern. Key order (lexicographic) is
    /// the registration order used for tie-breaking.
    #[serde(default)]
    pub meta_issuers: BTreeMap<String, IssuerDescriptor>,

    /// CT log; absent means no CT submission
    #[serde(default)]
    pub ct: Option<CtConfig>,

    /// Signing backend selection
    pub ca: BackendConfig,

    /// Leaf lifetime in seconds (default 600)
    #[serde(default = "default_lifetime_secs")]
    pub certificate_lifetime_secs: u64,
}

/// CT log configuration
#[derive(Debug, Deserialize)]
pub struct CtConfig {
    /// Base URL of the RFC 6962 log
    pub url: String,
    /// Embed the SCT (default) or return it detached
    #[serde(default)]
    pub sct_mode: SctMode,
    /// The log's public key (PEM); reserved for SCT verification
    #[serde(default)]
    pub public_key: Option<String>,
}

/// File-configurable backends
#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum BackendConfig {
    Ephemeral,
    File {
        /// PEM chain, signer first, root last
        cert_chain_path: PathBuf,
        /// PKCS#8 signing key, optionally encrypted
        key_path: PathBuf,
        /// Environment variable holding the key password
        #[serde(default)]
        key_password_env: Option<String>,
    },
}

impl CaConfig {
    /// Parse a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CaError::Config(e.to_string()))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CaError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Build the issuer registry snapshot. Map keys become the
    /// descriptors' issuer URLs / patterns.
    pub fn registry(&self) -> Result<IssuerRegistry> {
        let exact = keyed_descriptors(&self.oidc_issuers);
        let patterns = keyed_descriptors(&self.meta_issuers);
        IssuerRegistry::new(exact, patterns).map_err(|e| CaError::Config(e.to_string()))
    }

    /// Leaf lifetime as a duration
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.certificate_lifetime_secs as i64)
    }

    /// Construct the configured backend
    pub fn build_backend(&self) -> Result<SigningBackend> {
        match &self.ca {
            BackendConfig::Ephemeral => Ok(SigningBackend::Ephemeral(EphemeralCa::new()?)),
            BackendConfig::File {
                cert_chain_path,
                key_path,
                key_password_env,
            } => {
                let password = key_password_env
                    .as_deref()
                    .map(|var| {
                        std::env::var(var).map_err(|_| {
                            CaError::Config(format!("password variable {var} is not set"))
                        })
                    })
                    .transpose()?;
                Ok(SigningBackend::File(FileCa::load(
                    cert_chain_path,
                    key_path,
                    password.as_deref(),
                )?))
            }
        }
    }
}

fn keyed_descriptors(map: &BTreeMap<String, IssuerDescriptor>) -> Vec<IssuerDescriptor> {
    map.iter()
        .map(|(url, descriptor)| {
            let mut descriptor = descriptor.clone();
            if descriptor.issuer_url.is_empty() {
                descriptor.issuer_url = url.clone();
            }
            descriptor
        })
        .collect()
}
