//! Issuer descriptors: the configured identity providers.

use serde::{Deserialize, Serialize};

/// The identity flavor an issuer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssuerKind {
    Email,
    Spiffe,
    GithubWorkflow,
    Kubernetes,
    Uri,
    Username,
    BuildkiteJob,
    GitlabPipeline,
    CodefreshWorkflow,
    Chainguard,
}

impl std::fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssuerKind::Email => "email",
            IssuerKind::Spiffe => "spiffe",
            IssuerKind::GithubWorkflow => "github-workflow",
            IssuerKind::Kubernetes => "kubernetes",
            IssuerKind::Uri => "uri",
            IssuerKind::Username => "username",
            IssuerKind::BuildkiteJob => "buildkite-job",
            IssuerKind::GitlabPipeline => "gitlab-pipeline",
            IssuerKind::CodefreshWorkflow => "codefresh-workflow",
            IssuerKind::Chainguard => "chainguard",
        };
        write!(f, "{}", s)
    }
}

/// One `client_id` or several; tokens must carry at least one in `aud`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientIds {
    One(String),
    Many(Vec<String>),
}

impl ClientIds {
    /// View as a slice of audience strings
    pub fn as_slice(&self) -> &[String] {
        match self {
            ClientIds::One(s) => std::slice::from_ref(s),
            ClientIds::Many(v) => v.as_slice(),
        }
    }
}

/// A configured OIDC issuer.
///
/// `issuer_url` is either an exact URL or, when registered as a meta
/// issuer, a wildcard pattern (`*` matches one or more non-`/` chars).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerDescriptor {
    /// Exact issuer URL or wildcard pattern; filled from the config map key
    /// when omitted in the descriptor body
    #[serde(default)]
    pub issuer_url: String,

    /// Required `aud` value(s)
    #[serde(rename = "client_id")]
    pub client_ids: ClientIds,

    /// Identity flavor
    #[serde(rename = "type")]
    pub kind: IssuerKind,

    /// Trust domain SPIFFE subjects must belong to (`spiffe` only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spiffe_trust_domain: Option<String>,

    /// Domain `uri`/`username` subjects must belong to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_domain: Option<String>,

    /// Selector re-deriving the effective issuer from a claim
    /// (e.g. `$.federated_claims.connector_id` for federated providers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_claim: Option<String>,
}

impl IssuerDescriptor {
    /// Minimal descriptor for tests and programmatic registration
    pub fn new(issuer_url: impl Into<String>, client_id: impl Into<String>, kind: IssuerKind) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            client_ids: ClientIds::One(client_id.into()),
            kind,
            spiffe_trust_domain: None,
            subject_domain: None,
            issuer_claim: None,
        }
    }

    /// Set the SPIFFE trust domain
    pub fn with_trust_domain(mut self, td: impl Into<String>) -> Self {
        self.spiffe_trust_domain = Some(td.into());
        self
    }

    /// Set the subject domain
    pub fn with_subject_domain(mut self, domain: impl Into<String>) -> Self {
        self.subject_domain = Some(domain.into());
        self
    }

    /// Set the issuer claim selector
    pub fn with_issuer_claim(mut self, selector: impl Into<String>) -> Self {
        self.issuer_claim = Some(selector.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_single_or_list() {
        let single: IssuerDescriptor = serde_json::from_str(
            r#"{"client_id": "beacon", "type": "email"}"#,
        )
        .unwrap();
        assert_eq!(single.client_ids.as_slice(), ["beacon"]);

        let many: IssuerDescriptor = serde_json::from_str(
            r#"{"client_id": ["beacon", "beacon"], "type": "email"}"#,
        )
        .unwrap();
        assert_eq!(many.client_ids.as_slice(), ["beacon", "beacon"]);
    }

    #[test]
    fn test_kind_kebab_case() {
        let d: IssuerDescriptor = serde_json::from_str(
            r#"{"client_id": "x", "type": "github-workflow"}"#,
        )
        .unwrap();
        assert_eq!(d.kind, IssuerKind::GithubWorkflow);
        assert_eq!(d.kind.to_string(), "github-workflow");
    }
}
