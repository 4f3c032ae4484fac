//! SPIFFE workload identities.

use crate::claims::Claims;
use crate::error::{CoreError, Result};
use crate::issuer::IssuerDescriptor;

/// A SPIFFE identity under a configured trust domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiffePrincipal {
    /// Full `spiffe://<trust-domain>/<path>` id
    pub id: String,
    pub issuer: String,
}

pub(super) fn extract(claims: &Claims, descriptor: &IssuerDescriptor) -> Result<SpiffePrincipal> {
    let trust_domain = descriptor.spiffe_trust_domain.as_deref().ok_or_else(|| {
        CoreError::InvalidClaims(format!(
            "issuer '{}' has no spiffe_trust_domain configured",
            descriptor.issuer_url
        ))
    })?;

    let sub = &claims.subject;
    let remainder = sub.strip_prefix("spiffe://").ok_or_else(|| {
        CoreError::InvalidClaims(format!("subject is not a SPIFFE id: {sub}"))
    })?;
    let (domain, path) = remainder
        .split_once('/')
        .ok_or_else(|| CoreError::InvalidClaims(format!("SPIFFE id has no workload path: {sub}")))?;
    if path.is_empty() {
        return Err(CoreError::InvalidClaims(format!(
            "SPIFFE id has no workload path: {sub}"
        )));
    }
    if domain != trust_domain {
        return Err(CoreError::DomainMismatch {
            expected: trust_domain.to_string(),
            actual: domain.to_string(),
        });
    }

    Ok(SpiffePrincipal {
        id: sub.clone(),
        issuer: claims.issuer.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::IssuerKind;
    use chrono::Utc;

    fn claims(sub: &str) -> Claims {
        Claims {
            issuer: "https://allow.pub".into(),
            subject: sub.into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: serde_json::Map::new(),
        }
    }

    fn descriptor(td: &str) -> IssuerDescriptor {
        IssuerDescriptor::new("https://allow.pub", "beacon", IssuerKind::Spiffe)
            .with_trust_domain(td)
    }

    #[test]
    fn test_extract_in_trust_domain() {
        let p = extract(
            &claims("spiffe://allow.pub/ns/foo/sa/bar"),
            &descriptor("allow.pub"),
        )
        .unwrap();
        assert_eq!(p.id, "spiffe://allow.pub/ns/foo/sa/bar");
    }

    #[test]
    fn test_wrong_trust_domain() {
        let err = extract(
            &claims("spiffe://other.pub/ns/foo/sa/bar"),
            &descriptor("allow.pub"),
        )
        .unwrap_err();
        assert!(
            matches!(err, CoreError::DomainMismatch { expected, actual }
                if expected == "allow.pub" && actual == "other.pub")
        );
    }

    #[test]
    fn test_not_a_spiffe_id() {
        let err = extract(&claims("https://allow.pub/thing"), &descriptor("allow.pub"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }

    #[test]
    fn test_missing_workload_path() {
        let err = extract(&claims("spiffe://allow.pub"), &descriptor("allow.pub")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }

    #[test]
    fn test_unconfigured_trust_domain() {
        let d = IssuerDescriptor::new("https://allow.pub", "beacon", IssuerKind::Spiffe);
        let err = extract(&claims("spiffe://allow.pub/x"), &d).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }
}
