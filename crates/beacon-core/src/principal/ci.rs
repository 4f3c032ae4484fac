//! CI/CD platform identities: Buildkite, GitLab, Codefresh, Chainguard.

use url::Url;

use crate::claims::Claims;
use crate::error::{CoreError, Result};
use crate::extensions::ProvenanceExtensions;

/// A Buildkite job, identified by organization and pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildkiteJobPrincipal {
    pub subject: String,
    pub issuer: String,
    pub organization_slug: String,
    pub pipeline_slug: String,
}

pub(super) fn extract_buildkite(claims: &Claims) -> Result<BuildkiteJobPrincipal> {
    Ok(BuildkiteJobPrincipal {
        subject: claims.subject.clone(),
        issuer: claims.issuer.clone(),
        organization_slug: claims.require_str("organization_slug")?.to_string(),
        pipeline_slug: claims.require_str("pipeline_slug")?.to_string(),
    })
}

impl BuildkiteJobPrincipal {
    pub fn job_uri(&self) -> String {
        format!(
            "https://buildkite.com/{}/{}",
            self.organization_slug, self.pipeline_slug
        )
    }
}

/// A GitLab CI pipeline job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitlabPipelinePrincipal {
    pub subject: String,
    pub issuer: String,
    pub project_path: String,
    pub ci_config_ref_uri: String,
    pub job_id: String,
    pub pipeline_source: String,
    pub sha: String,
    pub git_ref: String,
    pub runner_environment: String,
    pub project_id: String,
    pub ci_config_sha: Option<String>,
}

pub(super) fn extract_gitlab(claims: &Claims) -> Result<GitlabPipelinePrincipal> {
    Ok(GitlabPipelinePrincipal {
        subject: claims.subject.clone(),
        issuer: claims.issuer.clone(),
        project_path: claims.require_str("project_path")?.to_string(),
        ci_config_ref_uri: claims.require_str("ci_config_ref_uri")?.to_string(),
        job_id: claims.require_str("job_id")?.to_string(),
        pipeline_source: claims.require_str("pipeline_source")?.to_string(),
        sha: claims.require_str("sha")?.to_string(),
        git_ref: claims.require_str("ref")?.to_string(),
        runner_environment: claims.require_str("runner_environment")?.to_string(),
        project_id: claims.require_str("project_id")?.to_string(),
        ci_config_sha: claims.str_claim("ci_config_sha").map(String::from),
    })
}

impl GitlabPipelinePrincipal {
    /// SAN URI: the CI config ref that produced the job
    pub fn config_uri(&self) -> String {
        format!("https://{}", self.ci_config_ref_uri)
    }

    pub(super) fn extensions(&self) -> ProvenanceExtensions {
        ProvenanceExtensions {
            issuer: self.issuer.clone(),
            build_signer_uri: Some(self.config_uri()),
            build_signer_digest: self.ci_config_sha.clone(),
            runner_environment: Some(self.runner_environment.clone()),
            source_repository_uri: Some(format!("https://gitlab.com/{}", self.project_path)),
            source_repository_digest: Some(self.sha.clone()),
            source_repository_ref: Some(self.git_ref.clone()),
            source_repository_identifier: Some(self.project_id.clone()),
            build_config_uri: Some(self.config_uri()),
            build_config_digest: self.ci_config_sha.clone(),
            build_trigger: Some(self.pipeline_source.clone()),
            run_invocation_uri: Some(format!(
                "https://gitlab.com/{}/-/jobs/{}",
                self.project_path, self.job_id
            )),
            ..Default::default()
        }
    }
}

/// A Codefresh workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodefreshWorkflowPrincipal {
    pub subject: String,
    pub issuer: String,
    pub workflow_id: String,
    pub platform_url: String,
    pub account_name: Option<String>,
    pub pipeline_name: Option<String>,
    pub scm_repo_url: Option<String>,
    pub scm_ref: Option<String>,
    pub runner_environment: Option<String>,
}

pub(super) fn extract_codefresh(claims: &Claims) -> Result<CodefreshWorkflowPrincipal> {
    Ok(CodefreshWorkflowPrincipal {
        subject: claims.subject.clone(),
        issuer: claims.issuer.clone(),
        workflow_id: claims.require_str("workflow_id")?.to_string(),
        platform_url: claims.require_str("platform_url")?.to_string(),
        account_name: claims.str_claim("account_name").map(String::from),
        pipeline_name: claims.str_claim("pipeline_name").map(String::from),
        scm_repo_url: claims.str_claim("scm_repo_url").map(String::from),
        scm_ref: claims.str_claim("scm_ref").map(String::from),
        runner_environment: claims.str_claim("runner_environment").map(String::from),
    })
}

impl CodefreshWorkflowPrincipal {
    /// SAN URI: the build page for this workflow run
    pub fn build_uri(&self) -> String {
        format!("{}/build/{}", self.platform_url, self.workflow_id)
    }

    pub(super) fn extensions(&self) -> ProvenanceExtensions {
        let signer = match (&self.account_name, &self.pipeline_name) {
            (Some(account), Some(pipeline)) => {
                Some(format!("{}/{}/{}", self.platform_url, account, pipeline))
            }
            _ => None,
        };
        ProvenanceExtensions {
            issuer: self.issuer.clone(),
            build_signer_uri: signer,
            runner_environment: self.runner_environment.clone(),
            source_repository_uri: self.scm_repo_url.clone(),
            source_repository_ref: self.scm_ref.clone(),
            run_invocation_uri: Some(self.build_uri()),
            ..Default::default()
        }
    }
}

/// A Chainguard workload identity; the subject is already a URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainguardPrincipal {
    pub subject: String,
    pub issuer: String,
}

pub(super) fn extract_chainguard(claims: &Claims) -> Result<ChainguardPrincipal> {
    Url::parse(&claims.subject)
        .map_err(|e| CoreError::InvalidClaims(format!("subject is not a URI: {e}")))?;
    Ok(ChainguardPrincipal {
        subject: claims.subject.clone(),
        issuer: claims.issuer.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn claims(issuer: &str, sub: &str, raw: serde_json::Value) -> Claims {
        Claims {
            issuer: issuer.into(),
            subject: sub.into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_buildkite_job_uri() {
        let c = claims(
            "https://agent.buildkite.com",
            "organization:acme:pipeline:release:build:24:job:x",
            json!({ "organization_slug": "acme", "pipeline_slug": "release" }),
        );
        let p = extract_buildkite(&c).unwrap();
        assert_eq!(p.job_uri(), "https://buildkite.com/acme/release");
    }

    #[test]
    fn test_gitlab_extensions() {
        let c = claims(
            "https://gitlab.com",
            "project_path:acme/tools:ref_type:branch:ref:main",
            json!({
                "project_path": "acme/tools",
                "ci_config_ref_uri": "gitlab.com/acme/tools//.gitlab-ci.yml@refs/heads/main",
                "ci_config_sha": "aaaa",
                "job_id": "7",
                "pipeline_source": "push",
                "sha": "bbbb",
                "ref": "refs/heads/main",
                "runner_environment": "gitlab-hosted",
                "project_id": "1234"
            }),
        );
        let p = extract_gitlab(&c).unwrap();
        assert_eq!(
            p.config_uri(),
            "https://gitlab.com/acme/tools//.gitlab-ci.yml@refs/heads/main"
        );
        let exts = p.extensions();
        assert_eq!(exts.build_trigger.as_deref(), Some("push"));
        assert_eq!(
            exts.run_invocation_uri.as_deref(),
            Some("https://gitlab.com/acme/tools/-/jobs/7")
        );
        assert_eq!(exts.source_repository_identifier.as_deref(), Some("1234"));
    }

    #[test]
    fn test_codefresh_build_uri() {
        let c = claims(
            "https://oidc.codefresh.io",
            "account:acme:pipeline:release",
            json!({
                "workflow_id": "64f0",
                "platform_url": "https://g.codefresh.io",
                "account_name": "acme",
                "pipeline_name": "release"
            }),
        );
        let p = extract_codefresh(&c).unwrap();
        assert_eq!(p.build_uri(), "https://g.codefresh.io/build/64f0");
        assert_eq!(
            p.extensions().build_signer_uri.as_deref(),
            Some("https://g.codefresh.io/acme/release")
        );
    }

    #[test]
    fn test_chainguard_requires_uri_subject() {
        let good = claims(
            "https://issuer.enforce.dev",
            "https://issuer.enforce.dev/groups/abc",
            json!({}),
        );
        assert!(extract_chainguard(&good).is_ok());

        let bad = claims("https://issuer.enforce.dev", "not a uri", json!({}));
        assert!(extract_chainguard(&bad).is_err());
    }
}
