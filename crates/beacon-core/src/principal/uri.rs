//! Generic URI identities scoped to a configured subject domain.

use url::Url;

use crate::claims::Claims;
use crate::error::{CoreError, Result};
use crate::issuer::IssuerDescriptor;

/// A URI identity whose origin matches the issuer's subject domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriPrincipal {
    pub uri: String,
    pub issuer: String,
}

pub(super) fn extract(claims: &Claims, descriptor: &IssuerDescriptor) -> Result<UriPrincipal> {
    let domain = descriptor.subject_domain.as_deref().ok_or_else(|| {
        CoreError::InvalidClaims(format!(
            "issuer '{}' has no subject_domain configured",
            descriptor.issuer_url
        ))
    })?;

    let subject = Url::parse(&claims.subject)
        .map_err(|e| CoreError::InvalidClaims(format!("subject is not a URI: {e}")))?;
    let expected = Url::parse(domain)
        .map_err(|e| CoreError::InvalidClaims(format!("subject_domain is not a URI: {e}")))?;

    // same origin: scheme, host and port must all agree
    if subject.scheme() != expected.scheme()
        || subject.host_str() != expected.host_str()
        || subject.port_or_known_default() != expected.port_or_known_default()
    {
        return Err(CoreError::DomainMismatch {
            expected: domain.to_string(),
            actual: claims.subject.clone(),
        });
    }

    Ok(UriPrincipal {
        uri: claims.subject.clone(),
        issuer: claims.issuer.clone(),
    })
}
