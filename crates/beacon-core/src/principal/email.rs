//! Email identities from interactive OIDC providers.

use crate::claims::Claims;
use crate::error::{CoreError, Result};

/// A verified email identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPrincipal {
    pub email: String,
    pub issuer: String,
}

pub(super) fn extract(claims: &Claims) -> Result<EmailPrincipal> {
    let email = claims.require_str("email")?;
    if !claims.bool_claim("email_verified").unwrap_or(false) {
        return Err(CoreError::UnverifiedEmail);
    }
    // just enough shape checking to refuse junk; full address validation
    // is the provider's job
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(CoreError::InvalidClaims(format!(
            "email claim is not an address: {email}"
        )));
    }
    Ok(EmailPrincipal {
        email: email.to_string(),
        issuer: claims.issuer.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn claims(raw: serde_json::Value) -> Claims {
        Claims {
            issuer: "https://accounts.google.com".into(),
            subject: "1234".into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_extract_verified_email() {
        let p = extract(&claims(json!({
            "email": "alice@example.com",
            "email_verified": true
        })))
        .unwrap();
        assert_eq!(p.email, "alice@example.com");
        assert_eq!(p.issuer, "https://accounts.google.com");
    }

    #[test]
    fn test_extract_string_encoded_verified_flag() {
        let p = extract(&claims(json!({
            "email": "alice@example.com",
            "email_verified": "true"
        })))
        .unwrap();
        assert_eq!(p.email, "alice@example.com");
    }

    #[test]
    fn test_unverified_email_rejected() {
        let err = extract(&claims(json!({
            "email": "alice@example.com",
            "email_verified": false
        })))
        .unwrap_err();
        assert!(matches!(err, CoreError::UnverifiedEmail));
    }

    #[test]
    fn test_missing_verified_flag_rejected() {
        let err = extract(&claims(json!({ "email": "alice@example.com" }))).unwrap_err();
        assert!(matches!(err, CoreError::UnverifiedEmail));
    }

    #[test]
    fn test_missing_email_claim() {
        let err = extract(&claims(json!({ "email_verified": true }))).unwrap_err();
        assert!(matches!(err, CoreError::MissingClaim(c) if c == "email"));
    }

    #[test]
    fn test_malformed_address() {
        let err = extract(&claims(json!({
            "email": "not-an-address",
            "email_verified": true
        })))
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidClaims(_)));
    }
}
