//! OIDC token verification.
//!
//! Two-pass decode: an unverified pass recovers the `iss` claim, which
//! selects the issuer descriptor and the JWKS; the verified pass checks
//! signature, expiry (30 s leeway) and audience. When the descriptor
//! configures an `issuer_claim`, the effective issuer is re-derived from
//! that claim after signature verification and the descriptor re-resolved.

use std::sync::{Arc, RwLock};

use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use beacon_core::{Claims, IssuerDescriptor};

use crate::error::{OidcError, Result};
use crate::jwks::{decoding_key, find_key, JwksCache};
use crate::registry::IssuerRegistry;

/// Clock skew tolerated on `exp`, in seconds
const LEEWAY_SECS: u64 = 30;

/// JWS algorithms Beacon accepts
const ALLOWED_ALGS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Verifies identity tokens against the configured issuers.
///
/// The registry snapshot is swapped atomically on reload; a request
/// captures one snapshot at entry and uses it throughout.
pub struct OidcVerifier {
    registry: RwLock<Arc<IssuerRegistry>>,
    jwks: JwksCache,
}

impl OidcVerifier {
    pub fn new(registry: Arc<IssuerRegistry>, jwks: JwksCache) -> Self {
        Self {
            registry: RwLock::new(registry),
            jwks,
        }
    }

    /// Replace the issuer registry snapshot.
    pub fn swap_registry(&self, next: Arc<IssuerRegistry>) {
        *self.registry.write().unwrap() = next;
    }

    /// The current registry snapshot.
    pub fn registry_snapshot(&self) -> Arc<IssuerRegistry> {
        self.registry.read().unwrap().clone()
    }

    /// Verify a raw token; returns the claims and the matched descriptor.
    pub async fn verify(&self, raw_token: &str) -> Result<(Claims, IssuerDescriptor)> {
        let registry = self.registry_snapshot();

        let header =
            decode_header(raw_token).map_err(|e| OidcError::InvalidToken(e.to_string()))?;
        if !ALLOWED_ALGS.contains(&header.alg) {
            return Err(OidcError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        // unverified pass, only to learn the issuer
        let mut insecure = Validation::new(header.alg);
        insecure.insecure_disable_signature_validation();
        insecure.validate_exp = false;
        insecure.validate_nbf = false;
        insecure.validate_aud = false;
        insecure.required_spec_claims.clear();
        let unverified = decode::<Map<String, Value>>(
            raw_token,
            &DecodingKey::from_secret(&[]),
            &insecure,
        )
        .map_err(|e| OidcError::InvalidToken(e.to_string()))?;

        let issuer = unverified
            .claims
            .get("iss")
            .and_then(Value::as_str)
            .ok_or_else(|| OidcError::InvalidToken("token has no iss claim".into()))?
            .to_string();

        let descriptor = registry
            .lookup(&issuer)
            .ok_or_else(|| OidcError::UnknownIssuer(issuer.clone()))?;

        // resolve keys and verify for real
        let cached = self.jwks.keys_for(&issuer).await?;
        let jwk = find_key(&cached.jwks, header.kid.as_deref())?;
        let key = decoding_key(jwk)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_audience(descriptor.client_ids.as_slice());

        let verified = decode::<Map<String, Value>>(raw_token, &key, &validation)?;
        let mut claims = claims_from_payload(issuer.clone(), verified.claims)?;

        // federated providers: re-derive the effective issuer from the
        // configured claim and re-resolve the descriptor
        if let Some(selector) = &descriptor.issuer_claim {
            let effective = claims
                .lookup(selector)
                .ok_or_else(|| {
                    OidcError::InvalidToken(format!("issuer claim '{selector}' not present"))
                })?
                .to_string();
            let effective_descriptor = registry.lookup(&effective).ok_or_else(|| {
                warn!(issuer = %issuer, effective = %effective, "Federated issuer not registered");
                OidcError::UnknownIssuer(effective.clone())
            })?;
            debug!(issuer = %issuer, effective = %effective, "Re-derived effective issuer");
            claims.issuer = effective;
            return Ok((claims, effective_descriptor.clone()));
        }

        Ok((claims, descriptor.clone()))
    }
}

fn claims_from_payload(issuer: String, payload: Map<String, Value>) -> Result<Claims> {
    let subject = payload
        .get("sub")
        .and_then(Value::as_str)
        .ok_or_else(|| OidcError::InvalidToken("token has no sub claim".into()))?
        .to_string();

    let audience = match payload.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    let expiry = payload
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| OidcError::InvalidToken("token has no exp claim".into()))?;

    Ok(Claims {
        issuer,
        subject,
        audience,
        expiry,
        raw: payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::{FetchedKeys, Jwk, JwkSet, KeySetFetcher};
    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use beacon_core::IssuerKind;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    use pkcs8::{EncodePrivateKey, LineEnding};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        signing_pem: String,
        jwks: JwkSet,
    }

    fn es256_fixture(kid: &str) -> Fixture {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let point = secret.public_key().to_encoded_point(false);
        let jwk = Jwk {
            kid: Some(kid.to_string()),
            kty: "EC".into(),
            alg: Some("ES256".into()),
            key_use: Some("sig".into()),
            n: None,
            e: None,
            crv: Some("P-256".into()),
            x: Some(URL_SAFE_NO_PAD.encode(point.x().unwrap())),
            y: Some(URL_SAFE_NO_PAD.encode(point.y().unwrap())),
        };
        Fixture {
            signing_pem: secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            jwks: JwkSet { keys: vec![jwk] },
        }
    }

    struct StubFetcher {
        jwks: JwkSet,
    }

    #[async_trait]
    impl KeySetFetcher for StubFetcher {
        async fn fetch(&self, _issuer_url: &str) -> Result<FetchedKeys> {
            Ok(FetchedKeys {
                keys: self.jwks.clone(),
                ttl: Duration::from_secs(300),
            })
        }
    }

    fn mint(fixture: &Fixture, kid: &str, payload: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_ec_pem(fixture.signing_pem.as_bytes()).unwrap();
        encode(&header, &payload, &key).unwrap()
    }

    fn verifier(fixture: &Fixture, registry: IssuerRegistry) -> OidcVerifier {
        let cache = JwksCache::new(Arc::new(StubFetcher {
            jwks: fixture.jwks.clone(),
        }));
        OidcVerifier::new(Arc::new(registry), cache)
    }

    fn google_registry() -> IssuerRegistry {
        IssuerRegistry::new(
            vec![IssuerDescriptor::new(
                "https://accounts.google.com",
                "beacon",
                IssuerKind::Email,
            )],
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300,
                "email": "alice@example.com",
                "email_verified": true
            }),
        );

        let (claims, descriptor) = v.verify(&token).await.unwrap();
        assert_eq!(claims.issuer, "https://accounts.google.com");
        assert_eq!(claims.subject, "user-1234");
        assert_eq!(claims.str_claim("email"), Some("alice@example.com"));
        assert_eq!(descriptor.kind, IssuerKind::Email);
    }

    #[tokio::test]
    async fn test_audience_mismatch() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "someone-else",
                "exp": Utc::now().timestamp() + 300
            }),
        );
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::AudienceMismatch(_)));
    }

    #[tokio::test]
    async fn test_audience_list_intersection() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": ["other", "beacon"],
                "exp": Utc::now().timestamp() + 300
            }),
        );
        assert!(v.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "beacon",
                // beyond the 30 s leeway
                "exp": Utc::now().timestamp() - 120
            }),
        );
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::Expired(_)));
    }

    #[tokio::test]
    async fn test_expiry_within_leeway_accepted() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() - 10
            }),
        );
        assert!(v.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_issuer() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://evil.example.com",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300
            }),
        );
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::UnknownIssuer(iss) if iss == "https://evil.example.com"));
    }

    #[tokio::test]
    async fn test_tampered_signature() {
        let fixture = es256_fixture("k1");
        let other = es256_fixture("k1");
        // verifier resolves the OTHER key set for this issuer
        let v = verifier(&other, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300
            }),
        );
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_issuer_claim_rederivation() {
        let fixture = es256_fixture("k1");
        let registry = IssuerRegistry::new(
            vec![
                IssuerDescriptor::new(
                    "https://oauth2.beacon.dev/auth",
                    "beacon",
                    IssuerKind::Email,
                )
                .with_issuer_claim("$.federated_claims.connector_id"),
                IssuerDescriptor::new(
                    "https://github.com/login/oauth",
                    "beacon",
                    IssuerKind::Email,
                ),
            ],
            vec![],
        )
        .unwrap();
        let v = verifier(&fixture, registry);

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://oauth2.beacon.dev/auth",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300,
                "federated_claims": { "connector_id": "https://github.com/login/oauth" }
            }),
        );

        let (claims, descriptor) = v.verify(&token).await.unwrap();
        assert_eq!(claims.issuer, "https://github.com/login/oauth");
        assert_eq!(descriptor.issuer_url, "https://github.com/login/oauth");
    }

    #[tokio::test]
    async fn test_issuer_claim_unregistered_connector() {
        let fixture = es256_fixture("k1");
        let registry = IssuerRegistry::new(
            vec![IssuerDescriptor::new(
                "https://oauth2.beacon.dev/auth",
                "beacon",
                IssuerKind::Email,
            )
            .with_issuer_claim("$.federated_claims.connector_id")],
            vec![],
        )
        .unwrap();
        let v = verifier(&fixture, registry);

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://oauth2.beacon.dev/auth",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300,
                "federated_claims": { "connector_id": "https://unregistered.example.com" }
            }),
        );
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::UnknownIssuer(_)));
    }

    #[tokio::test]
    async fn test_registry_swap() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());

        let token = mint(
            &fixture,
            "k1",
            json!({
                "iss": "https://accounts.google.com",
                "sub": "user-1234",
                "aud": "beacon",
                "exp": Utc::now().timestamp() + 300
            }),
        );
        assert!(v.verify(&token).await.is_ok());

        v.swap_registry(Arc::new(IssuerRegistry::new(vec![], vec![]).unwrap()));
        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, OidcError::UnknownIssuer(_)));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let fixture = es256_fixture("k1");
        let v = verifier(&fixture, google_registry());
        let err = v.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, OidcError::InvalidToken(_)));
    }
}
