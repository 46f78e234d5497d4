//! Key Resolver: fetches the provider's JWKS and resolves `kid` to a key.
//!
//! # Cache semantics
//!
//! - One process-lifetime snapshot of the key set, swapped wholesale on
//!   refresh. Readers clone the `Arc` and never wait on a fetch.
//! - A `kid` missing from the snapshot triggers exactly one fetch, unless
//!   the key set was fetched less than the minimum refresh interval ago; then
//!   the miss is answered from the snapshot. A failed fetch leaves the
//!   previous snapshot in place.
//! - No lock is held across the network call and nothing refreshes in the
//!   background.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use parking_lot::{Mutex, RwLock};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;

/// Default minimum gap between two key-set fetches triggered by unknown `kid`s
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Key-set fetch / lookup failures
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// Network error, timeout or unreadable body
    #[error("key set request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("key set endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The document is not a JWKS
    #[error("key set document is malformed: {0}")]
    Malformed(String),

    /// The key set does not contain the requested `kid`
    #[error("no signing key with id '{0}' in the provider key set")]
    UnknownKeyId(String),
}

impl JwksError {
    /// Whether the key set itself is unavailable, as opposed to the token
    /// naming a key the provider does not publish.
    #[must_use]
    pub fn is_outage(&self) -> bool {
        !matches!(self, Self::UnknownKeyId(_))
    }
}

/// One public signing key and the algorithm it declares, if any.
#[derive(Clone)]
pub struct SigningKey {
    key: DecodingKey,
    algorithm: Option<KeyAlgorithm>,
}

impl SigningKey {
    /// Key material for signature verification
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// `alg` declared by the JWK
    #[must_use]
    pub fn algorithm(&self) -> Option<KeyAlgorithm> {
        self.algorithm
    }

    fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            return None;
        }

        let key = match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).ok(),
            AlgorithmParameters::EllipticCurve(ec) => {
                DecodingKey::from_ec_components(&ec.x, &ec.y).ok()
            }
            AlgorithmParameters::OctetKey(_) | AlgorithmParameters::OctetKeyPair(_) => None,
        }?;

        Some(Self {
            key,
            algorithm: jwk.common.key_algorithm,
        })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of the provider's signing keys, keyed by `kid`.
#[derive(Debug, Clone, Default)]
pub struct SigningKeySet {
    keys: HashMap<String, SigningKey>,
}

impl SigningKeySet {
    /// Parse a JWKS document.
    ///
    /// Entries without a `kid`, encryption keys and key types that cannot
    /// verify signatures are skipped rather than failing the whole set.
    pub fn from_document(body: &[u8]) -> Result<Self, JwksError> {
        #[derive(Deserialize)]
        struct Document {
            keys: Vec<serde_json::Value>,
        }

        let document: Document =
            serde_json::from_slice(body).map_err(|e| JwksError::Malformed(e.to_string()))?;

        let mut keys = HashMap::with_capacity(document.keys.len());
        for entry in document.keys {
            let jwk: Jwk = match serde_json::from_value(entry) {
                Ok(jwk) => jwk,
                Err(e) => {
                    debug!(error = %e, "Skipping unparsable JWK");
                    continue;
                }
            };
            let Some(kid) = jwk.common.key_id.clone() else {
                debug!("Skipping JWK without 'kid'");
                continue;
            };
            match SigningKey::from_jwk(&jwk) {
                Some(key) => {
                    keys.insert(kid, key);
                }
                None => debug!(kid = %kid, "Skipping JWK unusable for signature verification"),
            }
        }

        Ok(Self { keys })
    }

    /// Key for `kid`
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    /// Number of usable keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no usable key
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key ids, sorted
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Resolves token key ids against the provider's published key set.
pub struct KeyResolver {
    http: reqwest::Client,
    jwks_url: String,
    keys: RwLock<Arc<SigningKeySet>>,
    min_refresh_interval: Duration,
    last_fetch: Mutex<Option<Instant>>,
}

impl KeyResolver {
    /// Create with an empty cache. Nothing is fetched until the first
    /// [`resolve`](Self::resolve) or an explicit [`refresh`](Self::refresh).
    #[must_use]
    pub fn new(http: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            http,
            jwks_url: jwks_url.into(),
            keys: RwLock::new(Arc::new(SigningKeySet::default())),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_fetch: Mutex::new(None),
        }
    }

    /// Create from the provider, auth and outbound client settings.
    #[must_use]
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        Self::new(http, config.provider.jwks_url())
            .with_min_refresh_interval(config.auth.min_refresh_interval)
    }

    /// Set the minimum gap between miss-driven fetches. Zero refetches on
    /// every miss.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Minimum gap between miss-driven fetches
    #[must_use]
    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    /// URL of the well-known key document
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<SigningKeySet> {
        Arc::clone(&self.keys.read())
    }

    /// Return the key for `kid`, fetching the key set once on a cache miss.
    ///
    /// A miss within the minimum refresh interval of the previous fetch
    /// fails with [`JwksError::UnknownKeyId`] without contacting the provider.
    pub async fn resolve(&self, kid: &str) -> Result<SigningKey, JwksError> {
        if let Some(key) = self.snapshot().get(kid) {
            return Ok(key.clone());
        }

        if !self.claim_fetch(false) {
            debug!(kid = %kid, "Key not in cached set, key set fetched too recently to refetch");
            return Err(JwksError::UnknownKeyId(kid.to_string()));
        }

        debug!(kid = %kid, "Key not in cached set, fetching key set");
        let fresh = self.fetch_and_store().await?;
        fresh
            .get(kid)
            .cloned()
            .ok_or_else(|| JwksError::UnknownKeyId(kid.to_string()))
    }

    /// Fetch the key set and replace the snapshot, regardless of the
    /// minimum refresh interval.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, JwksError> {
        self.claim_fetch(true);
        self.fetch_and_store().await
    }

    /// Record a fetch attempt starting now. Unless `force`d, refuses when the
    /// previous attempt is more recent than the minimum refresh interval.
    fn claim_fetch(&self, force: bool) -> bool {
        let mut last = self.last_fetch.lock();
        let now = Instant::now();
        let throttled =
            !force && last.is_some_and(|at| now.duration_since(at) < self.min_refresh_interval);
        if throttled {
            return false;
        }
        *last = Some(now);
        true
    }

    async fn fetch_and_store(&self) -> Result<Arc<SigningKeySet>, JwksError> {
        let fresh = Arc::new(self.fetch().await?);
        *self.keys.write() = Arc::clone(&fresh);
        info!(url = %self.jwks_url, keys = fresh.len(), "Signing key set refreshed");
        Ok(fresh)
    }

    async fn fetch(&self) -> Result<SigningKeySet, JwksError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JwksError::Status(status));
        }

        let body = response.bytes().await?;
        SigningKeySet::from_document(&body)
    }
}
