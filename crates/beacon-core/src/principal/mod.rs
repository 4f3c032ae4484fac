//! Principals: typed identities derived from verified OIDC claims.
//!
//! One variant per issuer flavor. Each variant owns the claim material it
//! extracted and knows how to shape a certificate: its stable name (the
//! challenge value), its SAN entries, and its provenance extensions.

mod ci;
mod email;
mod github;
mod kubernetes;
mod spiffe;
mod uri;
mod username;

pub use ci::{
    BuildkiteJobPrincipal, ChainguardPrincipal, CodefreshWorkflowPrincipal,
    GitlabPipelinePrincipal,
};
pub use email::EmailPrincipal;
pub use github::GithubWorkflowPrincipal;
pub use kubernetes::KubernetesPrincipal;
pub use spiffe::SpiffePrincipal;
pub use uri::UriPrincipal;
pub use username::UsernamePrincipal;

use crate::claims::Claims;
use crate::error::Result;
use crate::extensions::ProvenanceExtensions;
use crate::issuer::{IssuerDescriptor, IssuerKind};
use crate::san::SanValue;

/// A resolved identity, tagged by issuer flavor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Email(EmailPrincipal),
    Spiffe(SpiffePrincipal),
    GithubWorkflow(GithubWorkflowPrincipal),
    Kubernetes(KubernetesPrincipal),
    Uri(UriPrincipal),
    Username(UsernamePrincipal),
    BuildkiteJob(BuildkiteJobPrincipal),
    GitlabPipeline(GitlabPipelinePrincipal),
    CodefreshWorkflow(CodefreshWorkflowPrincipal),
    Chainguard(ChainguardPrincipal),
}

impl Principal {
    /// Derive a principal from verified claims, per the descriptor's flavor.
    /// Pure: no I/O, no clock.
    pub fn from_claims(claims: &Claims, descriptor: &IssuerDescriptor) -> Result<Self> {
        Ok(match descriptor.kind {
            IssuerKind::Email => Principal::Email(email::extract(claims)?),
            IssuerKind::Spiffe => Principal::Spiffe(spiffe::extract(claims, descriptor)?),
            IssuerKind::GithubWorkflow => {
                Principal::GithubWorkflow(github::extract(claims)?)
            }
            IssuerKind::Kubernetes => Principal::Kubernetes(kubernetes::extract(claims)?),
            IssuerKind::Uri => Principal::Uri(uri::extract(claims, descriptor)?),
            IssuerKind::Username => Principal::Username(username::extract(claims, descriptor)?),
            IssuerKind::BuildkiteJob => Principal::BuildkiteJob(ci::extract_buildkite(claims)?),
            IssuerKind::GitlabPipeline => {
                Principal::GitlabPipeline(ci::extract_gitlab(claims)?)
            }
            IssuerKind::CodefreshWorkflow => {
                Principal::CodefreshWorkflow(ci::extract_codefresh(claims)?)
            }
            IssuerKind::Chainguard => Principal::Chainguard(ci::extract_chainguard(claims)?),
        })
    }

    /// The stable identity string. Proof-of-possession signatures are
    /// verified over the UTF-8 bytes of this value, compared byte-exact.
    pub fn name(&self) -> &str {
        match self {
            Principal::Email(p) => &p.email,
            Principal::Spiffe(p) => &p.id,
            Principal::GithubWorkflow(p) => &p.subject,
            Principal::Kubernetes(p) => &p.name,
            Principal::Uri(p) => &p.uri,
            Principal::Username(p) => &p.username,
            Principal::BuildkiteJob(p) => &p.subject,
            Principal::GitlabPipeline(p) => &p.subject,
            Principal::CodefreshWorkflow(p) => &p.subject,
            Principal::Chainguard(p) => &p.subject,
        }
    }

    /// SAN entries, in certificate order
    pub fn subject_alternative_names(&self) -> Vec<SanValue> {
        match self {
            Principal::Email(p) => vec![SanValue::Email(p.email.clone())],
            Principal::Spiffe(p) => vec![SanValue::Uri(p.id.clone())],
            Principal::GithubWorkflow(p) => vec![SanValue::Uri(p.workflow_uri())],
            Principal::Kubernetes(p) => vec![SanValue::Uri(p.service_account_uri())],
            Principal::Uri(p) => vec![SanValue::Uri(p.uri.clone())],
            Principal::Username(p) => vec![SanValue::OtherName(p.other_name())],
            Principal::BuildkiteJob(p) => vec![SanValue::Uri(p.job_uri())],
            Principal::GitlabPipeline(p) => vec![SanValue::Uri(p.config_uri())],
            Principal::CodefreshWorkflow(p) => vec![SanValue::Uri(p.build_uri())],
            Principal::Chainguard(p) => vec![SanValue::Uri(p.subject.clone())],
        }
    }

    /// Certificate-shaping provenance extensions
    pub fn extensions(&self) -> ProvenanceExtensions {
        match self {
            Principal::Email(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::Spiffe(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::GithubWorkflow(p) => p.extensions(),
            Principal::Kubernetes(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::Uri(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::Username(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::BuildkiteJob(p) => ProvenanceExtensions::for_issuer(&p.issuer),
            Principal::GitlabPipeline(p) => p.extensions(),
            Principal::CodefreshWorkflow(p) => p.extensions(),
            Principal::Chainguard(p) => ProvenanceExtensions::for_issuer(&p.issuer),
        }
    }

    /// Whether the SAN extension must be marked critical. Only the username
    /// otherName is, since it is the sole subject identifier in the cert.
    pub fn san_critical(&self) -> bool {
        matches!(self, Principal::Username(_))
    }
}
