//! Unsigned certificate templates and TBS assembly.
//!
//! A template is everything about the leaf except who signs it: subject
//! key, validity window, SANs, provenance extensions, and whether this
//! rendering is a CT pre-certificate or carries an embedded SCT. The
//! signing backend supplies the issuer profile and produces signatures.

use chrono::{DateTime, Duration, Utc};
use der::asn1::{Null, OctetString};
use der::{Decode, Encode};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::{Digest, Sha1};
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

use crate::error::{CoreError, Result};
use crate::key::SubjectPublicKey;
use crate::oid;
use crate::principal::Principal;
use crate::san::marshal_sans;

/// Clock skew tolerated on the `not_before` edge
const BACKDATE: i64 = 5 * 60;

/// Issuer-side parameters needed to turn a template into a TBSCertificate
#[derive(Debug, Clone)]
pub struct CaProfile {
    /// Subject DN of the signing certificate
    pub issuer_name: Name,
    /// Key identifier of the signing key, for the AKI extension
    pub authority_key_id: Option<Vec<u8>>,
    /// Signature algorithm the backend will apply
    pub signature_algorithm: AlgorithmIdentifierOwned,
}

/// An unsigned leaf certificate
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    /// 20 random bytes, top bit cleared: a positive 159-bit integer
    pub serial: [u8; 20],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Subject key, DER SubjectPublicKeyInfo
    pub spki_der: Vec<u8>,
    /// Prebuilt SAN extension (criticality per the principal)
    pub san: Extension,
    /// OIDC provenance extensions, order preserved
    pub provenance: Vec<Extension>,
    /// Render as a CT pre-certificate (poison extension present)
    pub is_precert: bool,
    /// RFC 6962 SignedCertificateTimestampList to embed
    pub sct_list: Option<Vec<u8>>,
}

impl CertificateTemplate {
    /// Build the template for a resolved principal and verified key.
    ///
    /// `not_before` is backdated five minutes for clock skew;
    /// `not_after = now + lifetime`.
    pub fn for_principal(
        principal: &Principal,
        key: &SubjectPublicKey,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self> {
        let san = marshal_sans(
            &principal.subject_alternative_names(),
            principal.san_critical(),
        )?;
        let provenance = principal.extensions().render()?;

        Ok(Self {
            serial: random_serial(),
            not_before: now - Duration::seconds(BACKDATE),
            not_after: now + lifetime,
            spki_der: key.spki_der().to_vec(),
            san,
            provenance,
            is_precert: false,
            sct_list: None,
        })
    }

    /// The pre-certificate rendering of this template.
    pub fn precert(&self) -> Result<Self> {
        if self.sct_list.is_some() {
            return Err(CoreError::TemplateInvariant(
                "a pre-certificate cannot carry an embedded SCT".into(),
            ));
        }
        Ok(Self {
            is_precert: true,
            ..self.clone()
        })
    }

    /// The final rendering with an embedded SCT list.
    pub fn with_embedded_sct(&self, sct_list: Vec<u8>) -> Result<Self> {
        if self.is_precert {
            return Err(CoreError::TemplateInvariant(
                "a pre-certificate cannot carry an embedded SCT".into(),
            ));
        }
        Ok(Self {
            sct_list: Some(sct_list),
            ..self.clone()
        })
    }

    /// Serial as lowercase hex, for audit records
    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Assemble the TBSCertificate for the given issuer profile.
    pub fn to_tbs(&self, profile: &CaProfile) -> Result<TbsCertificate> {
        if self.is_precert && self.sct_list.is_some() {
            return Err(CoreError::TemplateInvariant(
                "poison and SCT extensions are mutually exclusive".into(),
            ));
        }

        let spki = SubjectPublicKeyInfoOwned::from_der(&self.spki_der)?;

        let mut extensions = Vec::with_capacity(8 + self.provenance.len());

        let key_usage = KeyUsage(KeyUsages::DigitalSignature.into());
        extensions.push(Extension {
            extn_id: const_oid::db::rfc5280::ID_CE_KEY_USAGE,
            critical: true,
            extn_value: OctetString::new(key_usage.to_der()?)?,
        });

        let eku = ExtendedKeyUsage(vec![oid::EKU_CODE_SIGNING]);
        extensions.push(Extension {
            extn_id: const_oid::db::rfc5280::ID_CE_EXT_KEY_USAGE,
            critical: false,
            extn_value: OctetString::new(eku.to_der()?)?,
        });

        let basic = BasicConstraints {
            ca: false,
            path_len_constraint: None,
        };
        extensions.push(Extension {
            extn_id: const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS,
            critical: true,
            extn_value: OctetString::new(basic.to_der()?)?,
        });

        let ski = SubjectKeyIdentifier(OctetString::new(
            Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec(),
        )?);
        extensions.push(Extension {
            extn_id: const_oid::db::rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER,
            critical: false,
            extn_value: OctetString::new(ski.to_der()?)?,
        });

        if let Some(aki) = &profile.authority_key_id {
            let aki = AuthorityKeyIdentifier {
                key_identifier: Some(OctetString::new(aki.clone())?),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            };
            extensions.push(Extension {
                extn_id: const_oid::db::rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER,
                critical: false,
                extn_value: OctetString::new(aki.to_der()?)?,
            });
        }

        extensions.push(self.san.clone());
        extensions.extend(self.provenance.iter().cloned());

        if self.is_precert {
            extensions.push(Extension {
                extn_id: oid::CT_POISON,
                critical: true,
                extn_value: OctetString::new(Null.to_der()?)?,
            });
        } else if let Some(sct_list) = &self.sct_list {
            let inner = OctetString::new(sct_list.clone())?.to_der()?;
            extensions.push(Extension {
                extn_id: oid::CT_SCT_LIST,
                critical: false,
                extn_value: OctetString::new(inner)?,
            });
        }

        Ok(TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial)?,
            signature: profile.signature_algorithm.clone(),
            issuer: profile.issuer_name.clone(),
            validity: Validity {
                not_before: to_time(self.not_before)?,
                not_after: to_time(self.not_after)?,
            },
            subject: Name::default(),
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// 20 bytes of cryptographic randomness with the top bit cleared, so the
/// big-endian integer is positive and at most 159 bits.
pub fn random_serial() -> [u8; 20] {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    bytes
}

fn to_time(at: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(at.timestamp())
        .map_err(|_| CoreError::TemplateInvariant("validity predates the epoch".into()))?;
    Ok(Time::UtcTime(der::asn1::UtcTime::from_unix_duration(
        std::time::Duration::from_secs(secs),
    )?))
}
