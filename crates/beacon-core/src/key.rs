//! Client public keys: parsing, acceptance policy, signature checks.
//!
//! Accepted algorithms: ECDSA on NIST P-256/P-384/P-521, RSA with
//! 2048-4096 bit moduli, and Ed25519. Everything else is refused at
//! parse time.

use const_oid::db::{rfc5912, rfc8410};
use const_oid::ObjectIdentifier;
use der::{Decode, Document};
use sha2::{Digest, Sha256, Sha384, Sha512};
use rsa::traits::PublicKeyParts;
use signature::hazmat::PrehashVerifier;
use signature::{DigestVerifier, Verifier};
use spki::{DecodePublicKey, SubjectPublicKeyInfoOwned};

use crate::error::{CoreError, Result};

/// A parsed, policy-checked subject public key
#[derive(Debug, Clone)]
pub struct SubjectPublicKey {
    kind: KeyKind,
    spki_der: Vec<u8>,
}

#[derive(Clone)]
enum KeyKind {
    EcdsaP256(p256::ecdsa::VerifyingKey),
    EcdsaP384(p384::ecdsa::VerifyingKey),
    EcdsaP521(p521::ecdsa::VerifyingKey),
    Rsa(Box<rsa::RsaPublicKey>),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl std::fmt::Debug for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::EcdsaP256(_) => f.write_str("EcdsaP256(..)"),
            KeyKind::EcdsaP384(_) => f.write_str("EcdsaP384(..)"),
            KeyKind::EcdsaP521(_) => f.write_str("EcdsaP521(..)"),
            KeyKind::Rsa(_) => f.write_str("Rsa(..)"),
            KeyKind::Ed25519(_) => f.write_str("Ed25519(..)"),
        }
    }
}

impl SubjectPublicKey {
    /// Parse and policy-check a DER-encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(spki_der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der)?;
        let kind = match spki.algorithm.oid {
            rfc5912::ID_EC_PUBLIC_KEY => {
                let params = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| CoreError::UnsupportedKey("EC key without curve".into()))?;
                let curve = ObjectIdentifier::from_bytes(params.value())
                    .map_err(|e| CoreError::UnsupportedKey(format!("bad EC curve OID: {e}")))?;
                match curve {
                    rfc5912::SECP_256_R_1 => KeyKind::EcdsaP256(
                        p256::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                            .map_err(|e| CoreError::UnsupportedKey(e.to_string()))?,
                    ),
                    rfc5912::SECP_384_R_1 => KeyKind::EcdsaP384(
                        p384::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                            .map_err(|e| CoreError::UnsupportedKey(e.to_string()))?,
                    ),
                    rfc5912::SECP_521_R_1 => KeyKind::EcdsaP521(
                        p521::ecdsa::VerifyingKey::from_sec1_bytes(
                            spki.subject_public_key.raw_bytes(),
                        )
                        .map_err(|e| CoreError::UnsupportedKey(e.to_string()))?,
                    ),
                    other => {
                        return Err(CoreError::UnsupportedKey(format!(
                            "unsupported EC curve: {other}"
                        )))
                    }
                }
            }
            rfc5912::RSA_ENCRYPTION => {
                let key = rsa::RsaPublicKey::from_public_key_der(spki_der)
                    .map_err(|e| CoreError::UnsupportedKey(e.to_string()))?;
                let bits = key.size() * 8;
                if bits < 2048 {
                    return Err(CoreError::WeakKey(format!(
                        "RSA modulus is {bits} bits, need at least 2048"
                    )));
                }
                if bits > 4096 {
                    return Err(CoreError::WeakKey(format!(
                        "RSA modulus is {bits} bits, at most 4096 is accepted"
                    )));
                }
                KeyKind::Rsa(Box::new(key))
            }
            rfc8410::ID_ED_25519 => KeyKind::Ed25519(
                ed25519_dalek::VerifyingKey::from_public_key_der(spki_der)
                    .map_err(|e| CoreError::UnsupportedKey(e.to_string()))?,
            ),
            other => {
                return Err(CoreError::UnsupportedKey(format!(
                    "unsupported public key algorithm: {other}"
                )))
            }
        };
        Ok(Self {
            kind,
            spki_der: spki_der.to_vec(),
        })
    }

    /// Parse a PEM `PUBLIC KEY` block.
    pub fn from_spki_pem(pem: &str) -> Result<Self> {
        let (label, doc) = Document::from_pem(pem)?;
        if label != "PUBLIC KEY" {
            return Err(CoreError::UnsupportedKey(format!(
                "expected a PUBLIC KEY block, got {label}"
            )));
        }
        Self::from_spki_der(doc.as_bytes())
    }

    /// The SubjectPublicKeyInfo DER, as embedded in certificates
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Short algorithm name for logs and audit records
    pub fn algorithm_name(&self) -> &'static str {
        match &self.kind {
            KeyKind::EcdsaP256(_) => "ecdsa-p256",
            KeyKind::EcdsaP384(_) => "ecdsa-p384",
            KeyKind::EcdsaP521(_) => "ecdsa-p521",
            KeyKind::Rsa(_) => "rsa",
            KeyKind::Ed25519(_) => "ed25519",
        }
    }

    /// Verify a proof-of-possession signature over `message`.
    ///
    /// ECDSA signatures are DER-encoded and hashed with the curve's
    /// matched digest; RSA accepts PKCS#1 v1.5 and then PSS, both over
    /// SHA-256; Ed25519 is verified strictly.
    pub fn verify_challenge(&self, message: &[u8], sig: &[u8]) -> Result<()> {
        match &self.kind {
            KeyKind::EcdsaP256(key) => {
                let sig = p256::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                key.verify(message, &sig).map_err(bad_sig)
            }
            KeyKind::EcdsaP384(key) => {
                let sig = p384::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                key.verify(message, &sig).map_err(bad_sig)
            }
            KeyKind::EcdsaP521(key) => {
                let sig = p521::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                key.verify(message, &sig).map_err(bad_sig)
            }
            KeyKind::Rsa(key) => {
                let hashed = Sha256::digest(message);
                key.verify(rsa::Pkcs1v15Sign::new::<Sha256>(), &hashed, sig)
                    .or_else(|_| key.verify(rsa::Pss::new::<Sha256>(), &hashed, sig))
                    .map_err(bad_sig)
            }
            KeyKind::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::from_slice(sig).map_err(bad_sig)?;
                key.verify_strict(message, &sig).map_err(bad_sig)
            }
        }
    }

    /// Verify a signature under an explicit X.509 signature algorithm,
    /// as found in a CSR. The algorithm must match the key type; ECDSA
    /// digests must be the curve-matched ones.
    pub fn verify_with_algorithm(
        &self,
        alg: ObjectIdentifier,
        message: &[u8],
        sig: &[u8],
    ) -> Result<()> {
        match (&self.kind, alg) {
            (KeyKind::EcdsaP256(key), rfc5912::ECDSA_WITH_SHA_256) => {
                let sig = p256::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                key.verify_digest(Sha256::new_with_prefix(message), &sig)
                    .map_err(bad_sig)
            }
            (KeyKind::EcdsaP384(key), rfc5912::ECDSA_WITH_SHA_384) => {
                let sig = p384::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                key.verify_digest(Sha384::new_with_prefix(message), &sig)
                    .map_err(bad_sig)
            }
            (KeyKind::EcdsaP521(key), rfc5912::ECDSA_WITH_SHA_512) => {
                let sig = p521::ecdsa::Signature::from_der(sig).map_err(bad_sig)?;
                let hashed = Sha512::digest(message);
                key.verify_prehash(&hashed, &sig).map_err(bad_sig)
            }
            (KeyKind::Rsa(key), rfc5912::SHA_256_WITH_RSA_ENCRYPTION) => {
                let hashed = Sha256::digest(message);
                key.verify(rsa::Pkcs1v15Sign::new::<Sha256>(), &hashed, sig)
                    .map_err(bad_sig)
            }
            (KeyKind::Rsa(key), rfc5912::SHA_384_WITH_RSA_ENCRYPTION) => {
                let hashed = Sha384::digest(message);
                key.verify(rsa::Pkcs1v15Sign::new::<Sha384>(), &hashed, sig)
                    .map_err(bad_sig)
            }
            (KeyKind::Rsa(key), rfc5912::SHA_512_WITH_RSA_ENCRYPTION) => {
                let hashed = Sha512::digest(message);
                key.verify(rsa::Pkcs1v15Sign::new::<Sha512>(), &hashed, sig)
                    .map_err(bad_sig)
            }
            (KeyKind::Ed25519(key), rfc8410::ID_ED_25519) => {
                let sig = ed25519_dalek::Signature::from_slice(sig).map_err(bad_sig)?;
                key.verify_strict(message, &sig).map_err(bad_sig)
            }
            (_, alg) => Err(CoreError::InvalidSignature(format!(
                "signature algorithm {alg} does not match the {} key",
                self.algorithm_name()
            ))),
        }
    }
}

fn bad_sig<E: std::fmt::Display>(err: E) -> CoreError {
    CoreError::InvalidSignature(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use spki::EncodePublicKey;

    fn p256_pair() -> (p256::ecdsa::SigningKey, SubjectPublicKey) {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let der = sk
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();
        let key = SubjectPublicKey::from_spki_der(&der).unwrap();
        (sk, key)
    }

    #[test]
    fn test_parse_p256() {
        let (_, key) = p256_pair();
        assert_eq!(key.algorithm_name(), "ecdsa-p256");
    }

    #[test]
    fn test_challenge_roundtrip_p256() {
        let (sk, key) = p256_pair();
        let msg = b"alice@example.com";
        let sig: p256::ecdsa::DerSignature = sk.sign(msg);
        key.verify_challenge(msg, sig.as_bytes()).unwrap();
    }

    #[test]
    fn test_challenge_wrong_message() {
        let (sk, key) = p256_pair();
        let sig: p256::ecdsa::DerSignature = sk.sign(b"alice@example.com");
        let err = key
            .verify_challenge(b"mallory@example.com", sig.as_bytes())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature(_)));
    }

    #[test]
    fn test_challenge_roundtrip_ed25519() {
        use ed25519_dalek::Signer as _;
        let sk = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let der = sk
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();
        let key = SubjectPublicKey::from_spki_der(&der).unwrap();
        let msg = b"spiffe://allow.pub/ns/foo/sa/bar";
        let sig = sk.sign(msg);
        key.verify_challenge(msg, &sig.to_bytes()).unwrap();
    }

    #[test]
    fn test_weak_rsa_rejected() {
        let mut rng = rand::rngs::OsRng;
        let sk = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let der = sk.to_public_key().to_public_key_der().unwrap().into_vec();
        let err = SubjectPublicKey::from_spki_der(&der).unwrap_err();
        assert!(matches!(err, CoreError::WeakKey(_)));
    }

    #[test]
    fn test_pem_parsing() {
        use der::EncodePem;
        let (_, key) = p256_pair();
        let spki = SubjectPublicKeyInfoOwned::from_der(key.spki_der()).unwrap();
        let pem = spki.to_pem(der::pem::LineEnding::LF).unwrap();
        let parsed = SubjectPublicKey::from_spki_pem(&pem).unwrap();
        assert_eq!(parsed.spki_der(), key.spki_der());
    }

    #[test]
    fn test_algorithm_mismatch_in_csr_path() {
        let (sk, key) = p256_pair();
        let msg = b"message";
        let sig: p256::ecdsa::DerSignature = sk.sign(msg);
        // P-256 key with the SHA-384 ECDSA OID must be refused
        let err = key
            .verify_with_algorithm(rfc5912::ECDSA_WITH_SHA_384, msg, sig.as_bytes())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature(_)));
    }
}
