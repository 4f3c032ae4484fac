//! JWKS resolution: discovery, fetch, and a single-flight cache.
//!
//! Keys are cached per issuer with the provider-declared TTL
//! (`Cache-Control: max-age`). Concurrent misses for one issuer coalesce
//! into a single fetch; no lock is held across the network call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use serde::Deserialize;
use tracing::debug;

use crate::error::{OidcError, Result};

/// Fallback TTL when the provider does not declare one
const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// Floor applied to provider-declared TTLs
const MIN_TTL: Duration = Duration::from_secs(60);

/// JWKS (JSON Web Key Set) response
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Individual JWK (JSON Web Key)
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    pub kid: Option<String>,
    /// Key type
    pub kty: String,
    /// Algorithm
    pub alg: Option<String>,
    /// Use (sig for signing)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (for RSA keys)
    pub n: Option<String>,
    /// RSA exponent (for RSA keys)
    pub e: Option<String>,
    /// EC curve (for EC keys)
    pub crv: Option<String>,
    /// EC x coordinate, or the Ed25519 public key for OKP keys
    pub x: Option<String>,
    /// EC y coordinate
    pub y: Option<String>,
}

/// A fetched key set plus the TTL the provider declared for it
#[derive(Debug, Clone)]
pub struct FetchedKeys {
    pub keys: JwkSet,
    pub ttl: Duration,
}

/// Resolves the signing keys for an issuer. The HTTP implementation does
/// OIDC discovery; tests inject fakes.
#[async_trait]
pub trait KeySetFetcher: Send + Sync {
    async fn fetch(&self, issuer_url: &str) -> Result<FetchedKeys>;
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// Fetches JWKS over HTTP via the issuer's discovery document
pub struct HttpKeySetFetcher {
    client: reqwest::Client,
}

impl HttpKeySetFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpKeySetFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self, issuer_url: &str) -> Result<FetchedKeys> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer_url.trim_end_matches('/')
        );
        debug!(issuer = %issuer_url, url = %discovery_url, "Fetching OIDC discovery document");
        let discovery: DiscoveryDocument = self
            .client
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(issuer = %issuer_url, url = %discovery.jwks_uri, "Fetching JWKS");
        let response = self
            .client
            .get(&discovery.jwks_uri)
            .send()
            .await?
            .error_for_status()?;

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .map(|declared| declared.max(MIN_TTL))
            .unwrap_or(DEFAULT_TTL);

        let keys: JwkSet = response.json().await?;
        Ok(FetchedKeys { keys, ttl })
    }
}

fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
    })
}

/// A cached key set with its expiry
#[derive(Debug)]
pub struct CachedKeys {
    pub jwks: JwkSet,
    expires_at: Instant,
}

/// Read-mostly JWKS cache keyed by issuer.
///
/// Expired entries are invalidated and refetched under moka's
/// `try_get_with`, which deduplicates concurrent fetches for the same
/// issuer (single-flight).
pub struct JwksCache {
    fetcher: Arc<dyn KeySetFetcher>,
    cache: Cache<String, Arc<CachedKeys>>,
}

impl JwksCache {
    pub fn new(fetcher: Arc<dyn KeySetFetcher>) -> Self {
        Self {
            fetcher,
            cache: Cache::builder().max_capacity(100).build(),
        }
    }

    /// Resolve the key set for an issuer, fetching on miss or expiry.
    pub async fn keys_for(&self, issuer_url: &str) -> Result<Arc<CachedKeys>> {
        if let Some(entry) = self.cache.get(issuer_url).await {
            if entry.expires_at > Instant::now() {
                debug!(issuer = %issuer_url, "Using cached JWKS");
                return Ok(entry);
            }
            self.cache.invalidate(issuer_url).await;
        }

        let fetcher = self.fetcher.clone();
        let issuer = issuer_url.to_string();
        self.cache
            .try_get_with(issuer_url.to_string(), async move {
                let fetched = fetcher.fetch(&issuer).await?;
                Ok::<_, OidcError>(Arc::new(CachedKeys {
                    jwks: fetched.keys,
                    expires_at: Instant::now() + fetched.ttl,
                }))
            })
            .await
            .map_err(|err: Arc<OidcError>| OidcError::KeyResolutionFailed(err.to_string()))
    }
}

/// Find a key in a JWKS by key ID; without a kid, the first signing key wins.
pub fn find_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk> {
    match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid))
            .ok_or_else(|| OidcError::KeyResolutionFailed(format!("no JWK with kid '{kid}'"))),
        None => jwks
            .keys
            .iter()
            .find(|k| k.key_use.as_deref() == Some("sig") || k.key_use.is_none())
            .ok_or_else(|| OidcError::KeyResolutionFailed("no signing key in JWKS".into())),
    }
}

/// Build a jsonwebtoken decoding key from a JWK
pub fn decoding_key(jwk: &Jwk) -> Result<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_ref()
                .ok_or_else(|| OidcError::InvalidToken("JWK missing RSA modulus".into()))?;
            let e = jwk
                .e
                .as_ref()
                .ok_or_else(|| OidcError::InvalidToken("JWK missing RSA exponent".into()))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| OidcError::InvalidToken(e.to_string()))
        }
        "EC" => {
            let x = jwk
                .x
                .as_ref()
                .ok_or_else(|| OidcError::InvalidToken("JWK missing EC x coordinate".into()))?;
            let y = jwk
                .y
                .as_ref()
                .ok_or_else(|| OidcError::InvalidToken("JWK missing EC y coordinate".into()))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| OidcError::InvalidToken(e.to_string()))
        }
        "OKP" => {
            let x = jwk
                .x
                .as_ref()
                .ok_or_else(|| OidcError::InvalidToken("JWK missing OKP public key".into()))?;
            DecodingKey::from_ed_components(x).map_err(|e| OidcError::InvalidToken(e.to_string()))
        }
        kty => Err(OidcError::UnsupportedAlgorithm(format!("JWK key type: {kty}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        ttl: Duration,
    }

    #[async_trait]
    impl KeySetFetcher for CountingFetcher {
        async fn fetch(&self, _issuer_url: &str) -> Result<FetchedKeys> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedKeys {
                keys: JwkSet { keys: vec![] },
                ttl: self.ttl,
            })
        }
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=3600, must-revalidate"),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(parse_max_age("no-store"), None);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        });
        let cache = JwksCache::new(fetcher.clone());

        cache.keys_for("https://accounts.google.com").await.unwrap();
        cache.keys_for("https://accounts.google.com").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            ttl: Duration::from_millis(0),
        });
        let cache = JwksCache::new(fetcher.clone());

        cache.keys_for("https://accounts.google.com").await.unwrap();
        cache.keys_for("https://accounts.google.com").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_flight_dedup() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            ttl: Duration::from_secs(300),
        });
        let cache = Arc::new(JwksCache::new(fetcher.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.keys_for("https://accounts.google.com").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        // a thundering herd for one issuer yields one fetch
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_find_key_by_kid() {
        let jwks = JwkSet {
            keys: vec![
                Jwk {
                    kid: Some("a".into()),
                    kty: "RSA".into(),
                    alg: None,
                    key_use: Some("sig".into()),
                    n: None,
                    e: None,
                    crv: None,
                    x: None,
                    y: None,
                },
                Jwk {
                    kid: Some("b".into()),
                    kty: "EC".into(),
                    alg: None,
                    key_use: None,
                    n: None,
                    e: None,
                    crv: None,
                    x: None,
                    y: None,
                },
            ],
        };
        assert_eq!(find_key(&jwks, Some("b")).unwrap().kty, "EC");
        assert!(find_key(&jwks, Some("missing")).is_err());
        assert_eq!(find_key(&jwks, None).unwrap().kid.as_deref(), Some("a"));
    }
}
