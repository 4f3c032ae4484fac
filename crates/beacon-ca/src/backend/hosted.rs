//! Hosted backend: issuance is delegated to an upstream certificate
//! authority service; we return whatever chain upstream produced.

use std::sync::Arc;

use async_trait::async_trait;

use beacon_core::CertificateTemplate;

use crate::error::Result;

/// An upstream CA (e.g. a cloud certificate authority service) that
/// signs on our behalf. Vendor API plumbing is the implementor's
/// concern.
#[async_trait]
pub trait UpstreamAuthority: Send + Sync {
    /// Issue a certificate for the template; returns the DER chain,
    /// leaf first, root last.
    async fn issue(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>>;
}

/// CA that forwards templates to an upstream issuer
pub struct HostedCa {
    upstream: Arc<dyn UpstreamAuthority>,
    /// Upstream's CA chain, PEM, signer first, root last
    bundle: Vec<String>,
}

impl HostedCa {
    pub fn new(upstream: Arc<dyn UpstreamAuthority>, bundle: Vec<String>) -> Self {
        Self { upstream, bundle }
    }

    pub(crate) async fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        self.upstream.issue(template).await
    }

    pub(crate) fn bundle(&self) -> Result<Vec<String>> {
        Ok(self.bundle.clone())
    }
}
