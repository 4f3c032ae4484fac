//! Ephemeral CA: fresh root + intermediate generated at process start.
//!
//! Keys live only in RAM and are lost on restart. Development and tests.

use chrono::{Duration, Utc};
use std::str::FromStr;
use x509_cert::name::Name;

use beacon_core::CertificateTemplate;

use crate::backend::keypair::{build_ca_certificate, CaCertParams, CaKeypair, LocalMaterial};
use crate::error::{CaError, Result};

const ROOT_DN: &str = "CN=beacon-root,O=beacon";
const INTERMEDIATE_DN: &str = "CN=beacon-intermediate,O=beacon";

/// In-memory two-level CA
#[derive(Debug)]
pub struct EphemeralCa {
    material: LocalMaterial,
}

impl EphemeralCa {
    /// Generate a root and an intermediate; the intermediate signs leaves.
    /// Called exactly once at startup.
    pub fn new() -> Result<Self> {
        let root_key = CaKeypair::generate_p256();
        let intermediate_key = CaKeypair::generate_p256();
        let now = Utc::now();

        let root_name = parse_dn(ROOT_DN)?;
        let intermediate_name = parse_dn(INTERMEDIATE_DN)?;

        let root = build_ca_certificate(
            CaCertParams {
                subject: root_name.clone(),
                issuer: root_name.clone(),
                subject_spki_der: root_key.spki_der()?,
                not_before: now,
                not_after: now + Duration::days(365 * 10),
                path_len: Some(1),
                authority_key_id: None,
            },
            &root_key,
        )?;

        let intermediate = build_ca_certificate(
            CaCertParams {
                subject: intermediate_name,
                issuer: root_name,
                subject_spki_der: intermediate_key.spki_der()?,
                not_before: now,
                not_after: now + Duration::days(365 * 5),
                path_len: Some(0),
                authority_key_id: Some(root_key.key_id()?),
            },
            &root_key,
        )?;

        // root key is dropped here; only the intermediate signs
        let material = LocalMaterial::new(intermediate_key, vec![intermediate, root])?;
        Ok(Self { material })
    }

    pub(crate) fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        self.material.sign(template)
    }

    pub(crate) fn bundle(&self) -> Result<Vec<String>> {
        self.material.bundle()
    }
}

fn parse_dn(dn: &str) -> Result<Name> {
    Name::from_str(dn).map_err(|e| CaError::Internal(format!("bad DN '{dn}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_is_intermediate_then_root() {
        let ca = EphemeralCa::new().unwrap();
        let bundle = ca.bundle().unwrap();
        assert_eq!(bundle.len(), 2);
        assert!(bundle[0].starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[test]
    fn test_two_instances_have_distinct_roots() {
        let a = EphemeralCa::new().unwrap().bundle().unwrap();
        let b = EphemeralCa::new().unwrap().bundle().unwrap();
        assert_ne!(a[1], b[1]);
    }
}
