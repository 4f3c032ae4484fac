//! Username identities bound to a configured domain via an otherName SAN.

use crate::claims::Claims;
use crate::error::{CoreError, Result};
use crate::issuer::IssuerDescriptor;

/// A `user!domain` identity.
///
/// The principal name (and therefore the challenge value) is the bare
/// username; the SAN carries the domain-qualified form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernamePrincipal {
    pub username: String,
    pub domain: String,
    pub issuer: String,
}

pub(super) fn extract(claims: &Claims, descriptor: &IssuerDescriptor) -> Result<UsernamePrincipal> {
    let domain = descriptor.subject_domain.as_deref().ok_or_else(|| {
        CoreError::InvalidClaims(format!(
            "issuer '{}' has no subject_domain configured",
            descriptor.issuer_url
        ))
    })?;

    let username = &claims.subject;
    if username.is_empty() {
        return Err(CoreError::MissingClaim("sub".into()));
    }
    // '!' separates user from domain in the SAN; an embedded one would
    // make the encoding ambiguous
    if username.contains('!') {
        return Err(CoreError::InvalidClaims(format!(
            "username must not contain '!': {username}"
        )));
    }

    Ok(UsernamePrincipal {
        username: username.clone(),
        domain: domain.to_string(),
        issuer: claims.issuer.clone(),
    })
}

impl UsernamePrincipal {
    /// The otherName SAN payload
    pub fn other_name(&self) -> String {
        format!("{}!{}", self.username, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::IssuerKind;
    use chrono::Utc;

    fn claims(sub: &str) -> Claims {
        Claims {
            issuer: "https://auth.example.com".into(),
            subject: sub.into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: serde_json::Map::new(),
        }
    }

    fn descriptor() -> IssuerDescriptor {
        IssuerDescriptor::new("https://auth.example.com", "beacon", IssuerKind::Username)
            .with_subject_domain("example.com")
    }

    #[test]
    fn test_extract_username() {
        let p = extract(&claims("foo"), &descriptor()).unwrap();
        assert_eq!(p.username, "foo");
        assert_eq!(p.other_name(), "foo!example.com");
    }

    #[test]
    fn test_bang_rejected() {
        let err = extract(&claims("foo!bar"), &descriptor()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }

    #[test]
    fn test_domain_required() {
        let d = IssuerDescriptor::new("https://auth.example.com", "beacon", IssuerKind::Username);
        let err = extract(&claims("foo"), &d).unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }

    #[test]
    fn test_empty_subject() {
        let err = extract(&claims(""), &descriptor()).unwrap_err();
        assert!(matches!(err, CoreError::MissingClaim(_)));
    }
}
