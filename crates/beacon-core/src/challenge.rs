//! Proof of private-key possession.
//!
//! Two paths: a PKCS#10 CSR whose embedded self-signature proves
//! possession, or a raw public key plus a signature over the principal
//! name. In both cases only the public key is trusted out of the
//! artifact; CSR subjects and SANs are discarded.

use der::{Decode, Encode};
use x509_cert::request::CertReq;

use crate::error::{CoreError, Result};
use crate::key::SubjectPublicKey;
use crate::principal::Principal;

/// Verify a CSR's self-signature and extract its public key.
pub fn verify_csr(csr_der: &[u8]) -> Result<SubjectPublicKey> {
    let csr = CertReq::from_der(csr_der)
        .map_err(|e| CoreError::InvalidSignature(format!("malformed CSR: {e}")))?;

    let info_der = csr.info.to_der()?;
    let spki_der = csr.info.public_key.to_der()?;
    let key = SubjectPublicKey::from_spki_der(&spki_der)?;

    let signature = csr
        .signature
        .as_bytes()
        .ok_or_else(|| CoreError::InvalidSignature("CSR signature has unused bits".into()))?;

    key.verify_with_algorithm(csr.algorithm.oid, &info_der, signature)?;
    Ok(key)
}

/// Verify a signed-challenge proof: a signature over the UTF-8 bytes of
/// the principal's name. Comparison is byte-exact; no normalization.
pub fn verify_signed_challenge(
    key: &SubjectPublicKey,
    principal: &Principal,
    signature: &[u8],
) -> Result<()> {
    key.verify_challenge(principal.name().as_bytes(), signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use const_oid::db::rfc5912;
    use der::asn1::BitString;
    use p256::ecdsa::signature::Signer;
    use spki::{EncodePublicKey, SubjectPublicKeyInfoOwned};
    use x509_cert::name::Name;
    use x509_cert::request::{CertReqInfo, Version};
    use x509_cert::spki::AlgorithmIdentifierOwned;

    fn p256_csr(sk: &p256::ecdsa::SigningKey, tamper: bool) -> Vec<u8> {
        let spki_der = sk.verifying_key().to_public_key_der().unwrap();
        let info = CertReqInfo {
            version: Version::V1,
            subject: Name::default(),
            public_key: SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap(),
            attributes: Default::default(),
        };
        let mut info_der = info.to_der().unwrap();
        if tamper {
            // sign over altered bytes so the embedded signature is wrong
            let last = info_der.len() - 1;
            info_der[last] ^= 0x01;
        }
        let sig: p256::ecdsa::DerSignature = sk.sign(&info_der);
        let csr = CertReq {
            info,
            algorithm: AlgorithmIdentifierOwned {
                oid: rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            signature: BitString::from_bytes(sig.as_bytes()).unwrap(),
        };
        csr.to_der().unwrap()
    }

    #[test]
    fn test_csr_self_signature_accepted() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let key = verify_csr(&p256_csr(&sk, false)).unwrap();
        assert_eq!(key.algorithm_name(), "ecdsa-p256");
    }

    #[test]
    fn test_csr_bad_signature_rejected() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let err = verify_csr(&p256_csr(&sk, true)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature(_)));
    }

    #[test]
    fn test_csr_garbage_rejected() {
        let err = verify_csr(b"not a csr").unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature(_)));
    }

    #[test]
    fn test_signed_challenge_over_principal_name() {
        use crate::claims::Claims;
        use crate::issuer::{IssuerDescriptor, IssuerKind};
        use chrono::Utc;
        use serde_json::json;

        let raw = json!({ "email": "alice@example.com", "email_verified": true });
        let claims = Claims {
            issuer: "https://accounts.google.com".into(),
            subject: "1234".into(),
            audience: vec!["beacon".into()],
            expiry: Utc::now() + chrono::Duration::minutes(5),
            raw: raw.as_object().unwrap().clone(),
        };
        let descriptor =
            IssuerDescriptor::new("https://accounts.google.com", "beacon", IssuerKind::Email);
        let principal = Principal::from_claims(&claims, &descriptor).unwrap();

        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let spki = sk.verifying_key().to_public_key_der().unwrap();
        let key = SubjectPublicKey::from_spki_der(spki.as_bytes()).unwrap();

        let sig: p256::ecdsa::DerSignature = sk.sign(b"alice@example.com");
        verify_signed_challenge(&key, &principal, sig.as_bytes()).unwrap();

        // byte-exact: a different message must fail
        let sig: p256::ecdsa::DerSignature = sk.sign(b"alice@example.net");
        assert!(verify_signed_challenge(&key, &principal, sig.as_bytes()).is_err());
    }
}
