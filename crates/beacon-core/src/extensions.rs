//! OIDC-provenance X.509 extensions under the `1.3.6.1.4.1.57264.1` arc.

use der::asn1::{OctetString, Utf8StringRef};
use der::Encode;
use x509_cert::ext::Extension;

use crate::error::{CoreError, Result};
use crate::oid;

/// Structured OIDC provenance, rendered into certificate extensions.
///
/// `issuer` is mandatory and emitted twice: as the DER `UTF8String`
/// extension (`.8`) and as the legacy raw-UTF-8 extension (`.1`).
/// The remaining legacy fields (`.2`-`.6`) carry raw UTF-8; everything
/// from `.9` up is a DER `UTF8String`. All extensions are non-critical
/// and emitted in ascending OID order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceExtensions {
    pub issuer: String,

    // legacy GitHub extensions (.2-.6), raw UTF-8
    pub github_workflow_trigger: Option<String>,
    pub github_workflow_sha: Option<String>,
    pub github_workflow_name: Option<String>,
    pub github_workflow_repository: Option<String>,
    pub github_workflow_ref: Option<String>,

    // structured provenance (.9-.22), DER UTF8String
    pub build_signer_uri: Option<String>,
    pub build_signer_digest: Option<String>,
    pub runner_environment: Option<String>,
    pub source_repository_uri: Option<String>,
    pub source_repository_digest: Option<String>,
    pub source_repository_ref: Option<String>,
    pub source_repository_identifier: Option<String>,
    pub source_repository_owner_uri: Option<String>,
    pub source_repository_owner_identifier: Option<String>,
    pub build_config_uri: Option<String>,
    pub build_config_digest: Option<String>,
    pub build_trigger: Option<String>,
    pub run_invocation_uri: Option<String>,
    pub source_repository_visibility_at_signing: Option<String>,
}

impl ProvenanceExtensions {
    /// Extensions carrying only the issuer pair
    pub fn for_issuer(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    /// Render into X.509 extensions, ascending OID order.
    pub fn render(&self) -> Result<Vec<Extension>> {
        if self.issuer.is_empty() {
            return Err(CoreError::TemplateInvariant(
                "provenance extensions require an issuer URL".into(),
            ));
        }

        let mut out = Vec::new();
        raw_utf8(&mut out, oid::ISSUER_LEGACY, Some(&self.issuer))?;
        raw_utf8(
            &mut out,
            oid::GITHUB_WORKFLOW_TRIGGER,
            self.github_workflow_trigger.as_deref(),
        )?;
        raw_utf8(
            &mut out,
            oid::GITHUB_WORKFLOW_SHA,
            self.github_workflow_sha.as_deref(),
        )?;
        raw_utf8(
            &mut out,
            oid::GITHUB_WORKFLOW_NAME,
            self.github_workflow_name.as_deref(),
        )?;
        raw_utf8(
            &mut out,
            oid::GITHUB_WORKFLOW_REPOSITORY,
            self.github_workflow_repository.as_deref(),
        )?;
        raw_utf8(
            &mut out,
            oid::GITHUB_WORKFLOW_REF,
            self.github_workflow_ref.as_deref(),
        )?;

        der_utf8(&mut out, oid::ISSUER, Some(&self.issuer))?;
        der_utf8(&mut out, oid::BUILD_SIGNER_URI, self.build_signer_uri.as_deref())?;
        der_utf8(
            &mut out,
            oid::BUILD_SIGNER_DIGEST,
            self.build_signer_digest.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::RUNNER_ENVIRONMENT,
            self.runner_environment.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_URI,
            self.source_repository_uri.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_DIGEST,
            self.source_repository_digest.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_REF,
            self.source_repository_ref.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_IDENTIFIER,
            self.source_repository_identifier.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_OWNER_URI,
            self.source_repository_owner_uri.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_OWNER_IDENTIFIER,
            self.source_repository_owner_identifier.as_deref(),
        )?;
        der_utf8(&mut out, oid::BUILD_CONFIG_URI, self.build_config_uri.as_deref())?;
        der_utf8(
            &mut out,
            oid::BUILD_CONFIG_DIGEST,
            self.build_config_digest.as_deref(),
        )?;
        der_utf8(&mut out, oid::BUILD_TRIGGER, self.build_trigger.as_deref())?;
        der_utf8(
            &mut out,
            oid::RUN_INVOCATION_URI,
            self.run_invocation_uri.as_deref(),
        )?;
        der_utf8(
            &mut out,
            oid::SOURCE_REPOSITORY_VISIBILITY,
            self.source_repository_visibility_at_signing.as_deref(),
        )?;

        Ok(out)
    }
}

fn raw_utf8(
    out: &mut Vec<Extension>,
    id: const_oid::ObjectIdentifier,
    value: Option<&str>,
) -> Result<()> {
    if let Some(v) = value {
        out.push(Extension {
            extn_id: id,
            critical: false,
            extn_value: OctetString::new(v.as_bytes())?,
        });
    }
    Ok(())
}

fn der_utf8(
    out: &mut Vec<Extension>,
    id: const_oid::ObjectIdentifier,
    value: Option<&str>,
) -> Result<()> {
    if let Some(v) = value {
        let inner = Utf8StringRef::new(v)?.to_der()?;
        out.push(Extension {
            extn_id: id,
            critical: false,
            extn_value: OctetString::new(inner)?,
        });
    }
    Ok(())
}
