//! Verified OIDC claims, as handed to the principal extractors.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Claims from a signature-verified OIDC token.
///
/// The verifier has already checked signature, expiry and audience; the
/// extractors only read identity material out of `raw`. Request-scoped
/// and immutable.
#[derive(Debug, Clone)]
pub struct Claims {
    /// Effective issuer URL (after optional `issuer_claim` re-derivation)
    pub issuer: String,
    /// The `sub` claim
    pub subject: String,
    /// The `aud` claim, normalized to a list
    pub audience: Vec<String>,
    /// The `exp` claim
    pub expiry: DateTime<Utc>,
    /// Every claim in the token payload
    pub raw: Map<String, Value>,
}

impl Claims {
    /// Get a string claim by name
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }

    /// Get a string claim, erroring with `MissingClaim` when absent or non-string
    pub fn require_str(&self, name: &str) -> Result<&str> {
        self.str_claim(name)
            .ok_or_else(|| CoreError::MissingClaim(name.to_string()))
    }

    /// Get a boolean claim; issuers sometimes encode booleans as strings
    pub fn bool_claim(&self, name: &str) -> Option<bool> {
        match self.raw.get(name)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Resolve a dotted selector like `$.federated_claims.connector_id`
    /// against the raw claims. Only object traversal is supported.
    pub fn lookup(&self, selector: &str) -> Option<&str> {
        let path = selector.strip_prefix("$.").unwrap_or(selector);
        let mut current: &Value = &Value::Null;
        for (i, segment) in path.split('.').enumerate() {
            current = if i == 0 {
                self.raw.get(segment)?
            } else {
                current.as_object()?.get(segment)?
            };
        }
        current.as_str()
    }
}
