//! Kubernetes service-account identities (projected service account tokens).

use crate::claims::Claims;
use crate::error::{CoreError, Result};

/// A Kubernetes service account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubernetesPrincipal {
    /// `{namespace}/{service_account}`
    pub name: String,
    pub namespace: String,
    pub service_account: String,
    pub issuer: String,
}

pub(super) fn extract(claims: &Claims) -> Result<KubernetesPrincipal> {
    // projected tokens nest identity under the literal "kubernetes.io" key
    let k8s = claims
        .raw
        .get("kubernetes.io")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CoreError::MissingClaim("kubernetes.io".into()))?;

    let namespace = k8s
        .get("namespace")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::MissingClaim("kubernetes.io.namespace".into()))?;
    let service_account = k8s
        .get("serviceaccount")
        .and_then(|v| v.as_object())
        .and_then(|sa| sa.get("name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::MissingClaim("kubernetes.io.serviceaccount.name".into()))?;

    Ok(KubernetesPrincipal {
        name: format!("{namespace}/{service_account}"),
        namespace: namespace.to_string(),
        service_account: service_account.to_string(),
        issuer: claims.issuer.clone(),
    })
}

impl KubernetesPrincipal {
    /// SAN URI for the service account
    pub fn service_account_uri(&self) -> String {
        format!(
            "https://kubernetes.io/namespaces/{}/serviceaccounts/{}",
            self.namespace, self.service_account
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn claims(raw: serde_json::Value) -> Claims {
        Claims {
            issuer: "https://oidc.eks.us-east-1.amazonaws.com/id/ABC123".into(),
            subject: "system:serviceaccount:default:builder".into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_extract_service_account() {
        let p = extract(&claims(json!({
            "kubernetes.io": {
                "namespace": "default",
                "serviceaccount": { "name": "builder", "uid": "abc-123" }
            }
        })))
        .unwrap();
        assert_eq!(p.name, "default/builder");
        assert_eq!(
            p.service_account_uri(),
            "https://kubernetes.io/namespaces/default/serviceaccounts/builder"
        );
    }

    #[test]
    fn test_missing_nested_claims() {
        let err = extract(&claims(json!({
            "kubernetes.io": { "namespace": "default" }
        })))
        .unwrap_err();
        assert!(
            matches!(err, CoreError::MissingClaim(c) if c == "kubernetes.io.serviceaccount.name")
        );
    }

    #[test]
    fn test_missing_kubernetes_block() {
        let err = extract(&claims(json!({ "sub": "whatever" }))).unwrap_err();
        assert!(matches!(err, CoreError::MissingClaim(c) if c == "kubernetes.io"));
    }
}
