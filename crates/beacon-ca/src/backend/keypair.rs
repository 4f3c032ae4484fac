//! In-process CA key material and certificate assembly.

use chrono::{DateTime, Utc};
use const_oid::db::{rfc5280, rfc5912, rfc8410};
use der::asn1::{BitString, OctetString};
use der::{Decode, Encode, EncodePem};
use pkcs8::{DecodePrivateKey, SecretDocument};
use sha1::{Digest, Sha1};
use signature::Signer;
use spki::EncodePublicKey;
use x509_cert::certificate::{TbsCertificate, Version};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use beacon_core::{random_serial, CaProfile, CertificateTemplate};

use crate::error::{CaError, Result};

/// A CA signing key held in process memory
pub enum CaKeypair {
    EcdsaP256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl std::fmt::Debug for CaKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            CaKeypair::EcdsaP256(_) => "ecdsa-p256",
            CaKeypair::Ed25519(_) => "ed25519",
        };
        f.debug_struct("CaKeypair")
            .field("kind", &kind)
            .field("key", &"[redacted]")
            .finish()
    }
}

impl CaKeypair {
    /// Generate a fresh P-256 signing key
    pub fn generate_p256() -> Self {
        CaKeypair::EcdsaP256(p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Load from a PKCS#8 PEM document; `ENCRYPTED PRIVATE KEY` blocks
    /// are unlocked with the password.
    pub fn from_pkcs8_pem(pem: &str, password: Option<&str>) -> Result<Self> {
        let (label, doc) = SecretDocument::from_pem(pem)
            .map_err(|e| CaError::Config(format!("bad private key PEM: {e}")))?;
        let doc = match label {
            "PRIVATE KEY" => doc,
            "ENCRYPTED PRIVATE KEY" => {
                let password = password.ok_or_else(|| {
                    CaError::KeyNotReady("signing key is encrypted and no password was given".into())
                })?;
                let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(doc.as_bytes())
                    .map_err(|e| CaError::Config(format!("bad encrypted key: {e}")))?;
                encrypted
                    .decrypt(password)
                    .map_err(|e| CaError::KeyNotReady(format!("could not unlock signing key: {e}")))?
            }
            other => {
                return Err(CaError::Config(format!(
                    "expected a PKCS#8 private key, got a {other} block"
                )))
            }
        };
        Self::from_pkcs8_der(doc.as_bytes())
    }

    /// Load from PKCS#8 DER
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)
            .map_err(|e| CaError::Config(format!("bad PKCS#8 document: {e}")))?;
        match info.algorithm.oid {
            rfc5912::ID_EC_PUBLIC_KEY => Ok(CaKeypair::EcdsaP256(
                p256::ecdsa::SigningKey::from_pkcs8_der(der)
                    .map_err(|e| CaError::Config(format!("bad P-256 key: {e}")))?,
            )),
            rfc8410::ID_ED_25519 => Ok(CaKeypair::Ed25519(
                ed25519_dalek::SigningKey::from_pkcs8_der(der)
                    .map_err(|e| CaError::Config(format!("bad Ed25519 key: {e}")))?,
            )),
            oid => Err(CaError::Config(format!(
                "unsupported CA key algorithm: {oid}"
            ))),
        }
    }

    /// Signature AlgorithmIdentifier this key produces
    pub fn signature_algorithm(&self) -> AlgorithmIdentifierOwned {
        let oid = match self {
            CaKeypair::EcdsaP256(_) => rfc5912::ECDSA_WITH_SHA_256,
            CaKeypair::Ed25519(_) => rfc8410::ID_ED_25519,
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    /// The public half as DER SubjectPublicKeyInfo
    pub fn spki_der(&self) -> Result<Vec<u8>> {
        let doc = match self {
            CaKeypair::EcdsaP256(key) => key.verifying_key().to_public_key_der(),
            CaKeypair::Ed25519(key) => key.verifying_key().to_public_key_der(),
        }
        .map_err(|e| CaError::Internal(format!("SPKI encoding: {e}")))?;
        Ok(doc.into_vec())
    }

    /// SHA-1 key identifier of the public key bits (for SKI/AKI)
    pub fn key_id(&self) -> Result<Vec<u8>> {
        let spki = SubjectPublicKeyInfoOwned::from_der(&self.spki_der()?)?;
        Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }

    /// Sign TBS bytes; ECDSA signatures are DER-encoded
    pub fn sign_tbs(&self, tbs_der: &[u8]) -> Result<Vec<u8>> {
        match self {
            CaKeypair::EcdsaP256(key) => {
                let signature: p256::ecdsa::DerSignature = key
                    .try_sign(tbs_der)
                    .map_err(|e| CaError::SigningFailed(e.to_string()))?;
                Ok(signature.as_bytes().to_vec())
            }
            CaKeypair::Ed25519(key) => Ok(key.sign(tbs_der).to_bytes().to_vec()),
        }
    }

    /// Sign a TBSCertificate and assemble the certificate
    pub fn sign_certificate(&self, tbs: TbsCertificate) -> Result<Certificate> {
        let tbs_der = tbs.to_der()?;
        let signature = self.sign_tbs(&tbs_der)?;
        Ok(Certificate {
            tbs_certificate: tbs,
            signature_algorithm: self.signature_algorithm(),
            signature: BitString::from_bytes(&signature)?,
        })
    }
}

/// Parameters for a root or intermediate certificate
pub(crate) struct CaCertParams {
    pub subject: Name,
    pub issuer: Name,
    pub subject_spki_der: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub path_len: Option<u8>,
    pub authority_key_id: Option<Vec<u8>>,
}

/// Build and sign a CA certificate (self-signed when subject == issuer
/// and the signer holds the subject key).
pub(crate) fn build_ca_certificate(
    params: CaCertParams,
    signer: &CaKeypair,
) -> Result<Certificate> {
    let spki = SubjectPublicKeyInfoOwned::from_der(&params.subject_spki_der)?;

    let mut extensions = Vec::with_capacity(4);

    let basic = BasicConstraints {
        ca: true,
        path_len_constraint: params.path_len,
    };
    extensions.push(Extension {
        extn_id: rfc5280::ID_CE_BASIC_CONSTRAINTS,
        critical: true,
        extn_value: OctetString::new(basic.to_der()?)?,
    });

    let key_usage = KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign);
    extensions.push(Extension {
        extn_id: rfc5280::ID_CE_KEY_USAGE,
        critical: true,
        extn_value: OctetString::new(key_usage.to_der()?)?,
    });

    let ski = SubjectKeyIdentifier(OctetString::new(
        Sha1::digest(spki.subject_public_key.raw_bytes()).to_vec(),
    )?);
    extensions.push(Extension {
        extn_id: rfc5280::ID_CE_SUBJECT_KEY_IDENTIFIER,
        critical: false,
        extn_value: OctetString::new(ski.to_der()?)?,
    });

    if let Some(aki) = params.authority_key_id {
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(aki)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        extensions.push(Extension {
            extn_id: rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER,
            critical: false,
            extn_value: OctetString::new(aki.to_der()?)?,
        });
    }

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&random_serial())?,
        signature: signer.signature_algorithm(),
        issuer: params.issuer,
        validity: Validity {
            not_before: to_time(params.not_before)?,
            not_after: to_time(params.not_after)?,
        },
        subject: params.subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    signer.sign_certificate(tbs)
}

fn to_time(at: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(at.timestamp())
        .map_err(|_| CaError::Internal("validity predates the epoch".into()))?;
    Ok(Time::UtcTime(
        der::asn1::UtcTime::from_unix_duration(std::time::Duration::from_secs(secs))
            .map_err(|e| CaError::Internal(format!("validity out of UTCTime range: {e}")))?,
    ))
}

/// Key material plus its certificate chain, for backends that sign in
/// process (ephemeral, file, Tink). Stateless signing; safe to share
/// across concurrent requests.
#[derive(Debug)]
pub(crate) struct LocalMaterial {
    keypair: CaKeypair,
    /// Signer certificate first, root last
    chain: Vec<Certificate>,
    profile: CaProfile,
}

impl LocalMaterial {
    pub fn new(keypair: CaKeypair, chain: Vec<Certificate>) -> Result<Self> {
        let signer_cert = chain
            .first()
            .ok_or_else(|| CaError::Config("CA chain is empty".into()))?;

        let chain_spki = signer_cert.tbs_certificate.subject_public_key_info.to_der()?;
        if chain_spki != keypair.spki_der()? {
            return Err(CaError::Config(
                "signing key does not match the chain's signer certificate".into(),
            ));
        }

        let profile = CaProfile {
            issuer_name: signer_cert.tbs_certificate.subject.clone(),
            authority_key_id: Some(keypair.key_id()?),
            signature_algorithm: keypair.signature_algorithm(),
        };

        Ok(Self {
            keypair,
            chain,
            profile,
        })
    }

    /// Sign a leaf template; returns the DER chain, leaf first, root last.
    pub fn sign(&self, template: &CertificateTemplate) -> Result<Vec<Vec<u8>>> {
        let tbs = template.to_tbs(&self.profile)?;
        let leaf = self.keypair.sign_certificate(tbs)?;

        let mut chain_der = Vec::with_capacity(1 + self.chain.len());
        chain_der.push(leaf.to_der()?);
        for cert in &self.chain {
            chain_der.push(cert.to_der()?);
        }
        Ok(chain_der)
    }

    /// CA chain as PEM, signer first, root last
    pub fn bundle(&self) -> Result<Vec<String>> {
        self.chain
            .iter()
            .map(|cert| {
                cert.to_pem(der::pem::LineEnding::LF)
                    .map_err(|e| CaError::Internal(format!("PEM encoding: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn self_signed_pair() -> (CaKeypair, Certificate) {
        let key = CaKeypair::generate_p256();
        let name = Name::from_str("CN=test-root,O=beacon").unwrap();
        let cert = build_ca_certificate(
            CaCertParams {
                subject: name.clone(),
                issuer: name,
                subject_spki_der: key.spki_der().unwrap(),
                not_before: Utc::now(),
                not_after: Utc::now() + Duration::days(365),
                path_len: None,
                authority_key_id: None,
            },
            &key,
        )
        .unwrap();
        (key, cert)
    }

    #[test]
    fn test_self_signed_root_verifies() {
        use signature::Verifier;
        let (key, cert) = self_signed_pair();

        let tbs_der = cert.tbs_certificate.to_der().unwrap();
        let sig =
            p256::ecdsa::Signature::from_der(cert.signature.as_bytes().unwrap()).unwrap();
        let vk = match &key {
            CaKeypair::EcdsaP256(sk) => *sk.verifying_key(),
            _ => unreachable!(),
        };
        vk.verify(&tbs_der, &sig).unwrap();
    }

    #[test]
    fn test_local_material_rejects_mismatched_key() {
        let (_, cert) = self_signed_pair();
        let other = CaKeypair::generate_p256();
        let err = LocalMaterial::new(other, vec![cert]).unwrap_err();
        assert!(matches!(err, CaError::Config(_)));
    }

    #[test]
    fn test_pkcs8_roundtrip_p256() {
        use pkcs8::EncodePrivateKey;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let pem = sk.to_pkcs8_pem(pkcs8::LineEnding::LF).unwrap();
        let loaded = CaKeypair::from_pkcs8_pem(&pem, None).unwrap();
        assert_eq!(
            loaded.spki_der().unwrap(),
            CaKeypair::EcdsaP256(sk).spki_der().unwrap()
        );
    }
}
