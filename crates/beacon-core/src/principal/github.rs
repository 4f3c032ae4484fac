//! GitHub Actions workflow identities.

use crate::claims::Claims;
use crate::error::Result;
use crate::extensions::ProvenanceExtensions;

/// A GitHub Actions workflow run.
///
/// The subject stays whatever GitHub minted (`repo:org/repo:ref:...`);
/// the SAN is the workflow ref URI, and the run metadata lands in the
/// provenance extension arc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubWorkflowPrincipal {
    pub subject: String,
    pub issuer: String,

    pub job_workflow_ref: String,
    pub sha: String,
    pub event_name: String,
    pub repository: String,
    pub workflow: String,
    pub git_ref: String,
    pub repository_id: String,
    pub repository_owner: String,
    pub repository_owner_id: String,
    pub run_id: String,
    pub run_attempt: String,
    pub runner_environment: String,
    pub repository_visibility: String,

    pub job_workflow_sha: Option<String>,
    pub workflow_ref: Option<String>,
    pub workflow_sha: Option<String>,
}

pub(super) fn extract(claims: &Claims) -> Result<GithubWorkflowPrincipal> {
    Ok(GithubWorkflowPrincipal {
        subject: claims.subject.clone(),
        issuer: claims.issuer.clone(),
        job_workflow_ref: claims.require_str("job_workflow_ref")?.to_string(),
        sha: claims.require_str("sha")?.to_string(),
        event_name: claims.require_str("event_name")?.to_string(),
        repository: claims.require_str("repository")?.to_string(),
        workflow: claims.require_str("workflow")?.to_string(),
        git_ref: claims.require_str("ref")?.to_string(),
        repository_id: claims.require_str("repository_id")?.to_string(),
        repository_owner: claims.require_str("repository_owner")?.to_string(),
        repository_owner_id: claims.require_str("repository_owner_id")?.to_string(),
        run_id: claims.require_str("run_id")?.to_string(),
        run_attempt: claims.require_str("run_attempt")?.to_string(),
        runner_environment: claims.require_str("runner_environment")?.to_string(),
        repository_visibility: claims.require_str("repository_visibility")?.to_string(),
        job_workflow_sha: claims.str_claim("job_workflow_sha").map(String::from),
        workflow_ref: claims.str_claim("workflow_ref").map(String::from),
        workflow_sha: claims.str_claim("workflow_sha").map(String::from),
    })
}

impl GithubWorkflowPrincipal {
    /// SAN URI: the reusable-workflow ref that ran the signing job
    pub fn workflow_uri(&self) -> String {
        format!("https://github.com/{}", self.job_workflow_ref)
    }

    pub(super) fn extensions(&self) -> ProvenanceExtensions {
        ProvenanceExtensions {
            issuer: self.issuer.clone(),
            github_workflow_trigger: Some(self.event_name.clone()),
            github_workflow_sha: Some(self.sha.clone()),
            github_workflow_name: Some(self.workflow.clone()),
            github_workflow_repository: Some(self.repository.clone()),
            github_workflow_ref: Some(self.git_ref.clone()),
            build_signer_uri: Some(self.workflow_uri()),
            build_signer_digest: Some(
                self.job_workflow_sha.clone().unwrap_or_else(|| self.sha.clone()),
            ),
            runner_environment: Some(self.runner_environment.clone()),
            source_repository_uri: Some(format!("https://github.com/{}", self.repository)),
            source_repository_digest: Some(self.sha.clone()),
            source_repository_ref: Some(self.git_ref.clone()),
            source_repository_identifier: Some(self.repository_id.clone()),
            source_repository_owner_uri: Some(format!(
                "https://github.com/{}",
                self.repository_owner
            )),
            source_repository_owner_identifier: Some(self.repository_owner_id.clone()),
            build_config_uri: self
                .workflow_ref
                .as_ref()
                .map(|r| format!("https://github.com/{r}")),
            build_config_digest: self.workflow_sha.clone(),
            build_trigger: Some(self.event_name.clone()),
            run_invocation_uri: Some(format!(
                "https://github.com/{}/actions/runs/{}/attempts/{}",
                self.repository, self.run_id, self.run_attempt
            )),
            source_repository_visibility_at_signing: Some(self.repository_visibility.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use chrono::Utc;
    use serde_json::json;

    pub(crate) fn workflow_claims() -> Claims {
        let raw = json!({
            "sub": "repo:acme/rocket:ref:refs/heads/main",
            "job_workflow_ref": "acme/rocket/.github/workflows/release.yml@refs/heads/main",
            "sha": "e8e9a6b5b1f0a1a4e2e7f0be47c54ab8c28e9e97",
            "event_name": "push",
            "repository": "acme/rocket",
            "workflow": "Release",
            "ref": "refs/heads/main",
            "repository_id": "292914002",
            "repository_owner": "acme",
            "repository_owner_id": "71096353",
            "run_id": "42",
            "run_attempt": "1",
            "runner_environment": "github-hosted",
            "repository_visibility": "public",
            "workflow_ref": "acme/rocket/.github/workflows/release.yml@refs/heads/main",
            "workflow_sha": "e8e9a6b5b1f0a1a4e2e7f0be47c54ab8c28e9e97"
        });
        Claims {
            issuer: "https://token.actions.githubusercontent.com".into(),
            subject: "repo:acme/rocket:ref:refs/heads/main".into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_extract_full_run() {
        let p = extract(&workflow_claims()).unwrap();
        assert_eq!(
            p.workflow_uri(),
            "https://github.com/acme/rocket/.github/workflows/release.yml@refs/heads/main"
        );
        assert_eq!(p.event_name, "push");
    }

    #[test]
    fn test_missing_workflow_ref() {
        let mut claims = workflow_claims();
        claims.raw.remove("job_workflow_ref");
        let err = extract(&claims).unwrap_err();
        assert!(matches!(err, CoreError::MissingClaim(c) if c == "job_workflow_ref"));
    }

    #[test]
    fn test_extension_mapping() {
        let p = extract(&workflow_claims()).unwrap();
        let exts = p.extensions();
        assert_eq!(exts.build_trigger.as_deref(), Some("push"));
        assert_eq!(
            exts.run_invocation_uri.as_deref(),
            Some("https://github.com/acme/rocket/actions/runs/42/attempts/1")
        );
        assert_eq!(
            exts.source_repository_owner_uri.as_deref(),
            Some("https://github.com/acme")
        );
        assert_eq!(exts.source_repository_visibility_at_signing.as_deref(), Some("public"));
        // no job_workflow_sha claim: signer digest falls back to the commit sha
        assert_eq!(exts.build_signer_digest.as_deref(), Some(p.sha.as_str()));
    }

    #[test]
    fn test_rendered_extension_count() {
        let p = extract(&workflow_claims()).unwrap();
        // .1 + five legacy GitHub fields + .8 + all fourteen structured
        // fields (the fixture provides the optional build-config pair)
        let exts = p.extensions().render().unwrap();
        assert_eq!(exts.len(), 21);
    }
}
