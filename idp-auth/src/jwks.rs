//! JWKS key resolution
//!
//! Resolves verification keys from the identity provider's published key
//! set. The `jwks_uri` is read from the OIDC discovery document at
//! [`IdpOptions::metadata_url`] and the keys are cached in process.
//!
//! The cache is refreshed when a token names a `kid` it does not hold and,
//! optionally, on a timer via [`JwksKeyResolver::spawn_refresh`]. Refreshes
//! are serialized: concurrent misses wait for the fetch already in flight.
//! Miss-triggered attempts, failed ones included, happen at most once per
//! cooldown window; until it ends the last failure is returned instead of
//! calling the provider again.

use crate::error::{ConfigError, KeyError};
use crate::keys::{decoding_keys, lookup_without_kid, KeyEntry, SigningKeyResolver};
use crate::options::IdpOptions;
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// HTTP timeout for discovery and key set requests.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum time between refreshes triggered by unknown key ids.
pub const DEFAULT_MISS_COOLDOWN: Duration = Duration::from_secs(30);

/// OpenID Connect discovery document (partial).
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, KeyEntry>,
    /// Last successful refresh
    refreshed_at: Option<Instant>,
    /// Last refresh attempt, successful or not
    attempted_at: Option<Instant>,
    /// Error of the last attempt, cleared on success
    last_error: Option<KeyError>,
}

/// Key resolver backed by the issuer's JWKS endpoint.
pub struct JwksKeyResolver {
    metadata_url: String,
    require_https: bool,
    jwks_uri: RwLock<Option<String>>,
    cache: RwLock<KeyCache>,
    refresh_guard: Mutex<()>,
    miss_cooldown: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for JwksKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeyResolver")
            .field("metadata_url", &self.metadata_url)
            .field("require_https", &self.require_https)
            .field("miss_cooldown", &self.miss_cooldown)
            .finish_non_exhaustive()
    }
}

impl JwksKeyResolver {
    /// Create a resolver for the provider described by `options`.
    ///
    /// No request is made until the first key is needed.
    pub fn new(options: &IdpOptions) -> Result<Self, ConfigError> {
        let metadata_url = options.metadata_url();
        if options.require_https && !is_https(&metadata_url) {
            return Err(ConfigError::InvalidValue {
                key: "MetadataAddress".to_string(),
                message: format!(
                    "'{}' must use HTTPS unless RequireHttps is disabled",
                    metadata_url
                ),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "MetadataAddress".to_string(),
                message: format!("HTTP client could not be created: {}", e),
            })?;

        Ok(Self {
            metadata_url,
            require_https: options.require_https,
            jwks_uri: RwLock::new(None),
            cache: RwLock::new(KeyCache::default()),
            refresh_guard: Mutex::new(()),
            miss_cooldown: DEFAULT_MISS_COOLDOWN,
            client,
        })
    }

    /// Use a known `jwks_uri` and skip discovery.
    pub fn with_jwks_uri(self, jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: RwLock::new(Some(jwks_uri.into())),
            ..self
        }
    }

    /// Change the minimum interval between miss-triggered refreshes.
    pub fn with_miss_cooldown(mut self, cooldown: Duration) -> Self {
        self.miss_cooldown = cooldown;
        self
    }

    /// Discovery document address.
    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }

    /// Number of cached keys.
    pub async fn cached_key_count(&self) -> usize {
        self.cache.read().await.keys.len()
    }

    /// Fetch the key set and replace the cache.
    ///
    /// Returns the number of keys now cached. On failure the previous keys
    /// stay in use.
    pub async fn refresh(&self) -> Result<usize, KeyError> {
        let _guard = self.refresh_guard.lock().await;
        self.refresh_locked().await
    }

    /// Refresh while holding `refresh_guard`.
    #[instrument(skip(self), fields(metadata_url = %self.metadata_url))]
    async fn refresh_locked(&self) -> Result<usize, KeyError> {
        self.cache.write().await.attempted_at = Some(Instant::now());

        match self.fetch_keys().await {
            Ok(keys) => {
                let count = keys.len();
                let mut cache = self.cache.write().await;
                cache.keys = keys;
                cache.refreshed_at = Some(Instant::now());
                cache.last_error = None;
                info!(count, "JWKS cache refreshed");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "JWKS refresh failed");
                self.cache.write().await.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, KeyEntry>, KeyError> {
        let jwks_uri = self.jwks_uri().await?;
        let set: JwkSet = self.fetch_json(&jwks_uri).await?;
        decoding_keys(&set)
    }

    /// Refresh the cache every `every` in a background task.
    ///
    /// The first refresh runs immediately. Failures are logged and the
    /// previous keys stay in use.
    pub fn spawn_refresh(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if self.refresh().await.is_err() {
                    debug!("Scheduled JWKS refresh failed, keeping previous keys");
                }
            }
        })
    }

    async fn jwks_uri(&self) -> Result<String, KeyError> {
        if let Some(uri) = self.jwks_uri.read().await.clone() {
            return Ok(uri);
        }

        debug!("Fetching OIDC discovery document");
        let document: DiscoveryDocument = self.fetch_json(&self.metadata_url).await?;
        if self.require_https && !is_https(&document.jwks_uri) {
            return Err(KeyError::Unavailable(format!(
                "jwks_uri '{}' does not use HTTPS",
                document.jwks_uri
            )));
        }

        *self.jwks_uri.write().await = Some(document.jwks_uri.clone());
        Ok(document.jwks_uri)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, KeyError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyError::Unavailable(format!("request to '{}' failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(KeyError::Unavailable(format!(
                "'{}' returned status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| KeyError::Unavailable(format!("'{}' returned invalid JSON: {}", url, e)))
    }

    async fn cached(
        &self,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Option<Result<DecodingKey, KeyError>> {
        let cache = self.cache.read().await;
        cache.refreshed_at?;
        match kid {
            Some(kid) => cache.keys.get(kid).map(|entry| entry.for_algorithm(kid, alg)),
            None => Some(lookup_without_kid(&cache.keys, None, alg)),
        }
    }

    /// `Ok(true)` when a miss may trigger a fetch now, `Err` with the last
    /// failure while a failed attempt is cooling down.
    async fn may_refresh(&self) -> Result<bool, KeyError> {
        let cache = self.cache.read().await;
        match cache.attempted_at {
            None => Ok(true),
            Some(at) if at.elapsed() >= self.miss_cooldown => Ok(true),
            Some(_) => match &cache.last_error {
                Some(e) => Err(e.clone()),
                None => Ok(false),
            },
        }
    }
}

#[async_trait]
impl SigningKeyResolver for JwksKeyResolver {
    async fn resolve(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey, KeyError> {
        if let Some(found) = self.cached(kid, alg).await {
            return found;
        }

        let _guard = self.refresh_guard.lock().await;
        // A refresh may have completed while waiting for the guard.
        if let Some(found) = self.cached(kid, alg).await {
            return found;
        }

        if self.may_refresh().await? {
            debug!(kid = ?kid, "Signing key not cached, refreshing JWKS");
            self.refresh_locked().await?;
        }

        match self.cached(kid, alg).await {
            Some(found) => found,
            None => Err(match kid {
                Some(kid) => KeyError::KeyNotFound(kid.to_string()),
                None => KeyError::NoKeys,
            }),
        }
    }
}

fn is_https(url: &str) -> bool {
    url.get(..8)
        .map(|scheme| scheme.eq_ignore_ascii_case("https://"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_required_for_metadata() {
        let options = IdpOptions::new("http://idp.local", "client");
        assert!(matches!(
            JwksKeyResolver::new(&options),
            Err(ConfigError::InvalidValue { .. })
        ));

        let options = options.with_require_https(false);
        let resolver = JwksKeyResolver::new(&options).unwrap();
        assert_eq!(
            resolver.metadata_url(),
            "http://idp.local/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_is_https() {
        assert!(is_https("https://idp"));
        assert!(is_https("HTTPS://idp"));
        assert!(!is_https("http://idp"));
        assert!(!is_https("ftp"));
    }
}
