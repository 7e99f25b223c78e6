//! Signing-key discovery and caching
//!
//! Firebase ID tokens are signed with rotating Google keys published as a
//! JSON Web Key Set. [`JwksClient`] fetches that set and caches it:
//!
//! - a fresh cache entry is served directly,
//! - an expired entry is still served for the current call while a single
//!   background task refreshes it (verifications never wait on a refresh),
//! - an empty cache is filled inline,
//! - fetch attempts (forced, background or inline) are at most one per
//!   minimum refresh interval, measured from the last attempt whether or
//!   not it succeeded,
//! - the cache lifetime follows the endpoint's `Cache-Control: max-age`.
//!
//! [`StaticKeySource`] serves a fixed key set (tests, emulators).

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Failure to obtain signing keys
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyDiscoveryError {
    #[error("signing key endpoint must use HTTPS (HTTP only allowed for loopback): {0}")]
    InsecureEndpoint(String),

    #[error("failed to fetch signing keys: {0}")]
    Fetch(String),

    #[error("signing key endpoint returned status {0}")]
    Status(u16),

    #[error("invalid signing key set: {0}")]
    Parse(String),

    #[error("signing key fetch failed recently, not retrying yet")]
    Backoff,
}

/// Source of the public keys used to verify token signatures
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Current key set, possibly served from cache
    async fn keys(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError>;

    /// Re-fetch the key set, e.g. after seeing an unknown key id.
    /// Implementations may rate limit and return the cached set instead.
    async fn refresh(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError>;
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: Arc<JwkSet>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedJwks {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// HTTP client for a JWKS endpoint with a shared key cache
#[derive(Debug, Clone)]
pub struct JwksClient {
    jwks_uri: String,
    http_client: reqwest::Client,
    /// TTL used when the response carries no max-age
    default_ttl: Duration,
    min_refresh_interval: Duration,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    /// Serializes fetches and holds the time of the last attempt, successful or not
    fetch_lock: Arc<Mutex<Option<Instant>>>,
    /// Set while a background refresh task is running
    refreshing: Arc<AtomicBool>,
}

impl JwksClient {
    pub fn new(jwks_uri: impl Into<String>, default_ttl: Duration) -> Result<Self, KeyDiscoveryError> {
        let jwks_uri = jwks_uri.into();
        if !is_allowed_endpoint(&jwks_uri) {
            return Err(KeyDiscoveryError::InsecureEndpoint(jwks_uri));
        }

        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| KeyDiscoveryError::Fetch(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            jwks_uri,
            http_client,
            default_ttl,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
            cache: Arc::new(RwLock::new(None)),
            fetch_lock: Arc::new(Mutex::new(None)),
            refreshing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    fn attempted_recently(&self, last_attempt: Option<Instant>) -> bool {
        last_attempt.is_some_and(|at| at.elapsed() < self.min_refresh_interval)
    }

    fn spawn_background_refresh(&self) {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            let mut last_attempt = client.fetch_lock.lock().await;
            if client.attempted_recently(*last_attempt) {
                debug!(jwks_uri = %client.jwks_uri, "Skipping background refresh, last attempt too recent");
            } else {
                debug!(jwks_uri = %client.jwks_uri, "Refreshing stale signing keys in background");
                *last_attempt = Some(Instant::now());
                if let Err(e) = client.fetch_and_cache().await {
                    warn!(jwks_uri = %client.jwks_uri, error = %e, "Background signing key refresh failed, serving stale keys");
                }
            }
            drop(last_attempt);
            client.refreshing.store(false, Ordering::Release);
        });
    }

    /// Fetch under the lock, unless another task filled the cache while we
    /// waited or the last attempt is within the minimum refresh interval.
    /// A failed fetch falls back to the cached set when there is one.
    async fn fetch_inline(&self, force: bool) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        let mut last_attempt = self.fetch_lock.lock().await;
        let cached = self.cache.read().await.as_ref().map(|c| (c.jwks.clone(), c.is_fresh()));

        match &cached {
            Some((jwks, fresh)) if !force && *fresh => return Ok(jwks.clone()),
            Some((jwks, _)) if self.attempted_recently(*last_attempt) => {
                debug!(jwks_uri = %self.jwks_uri, "Refresh rate limited, using cached signing keys");
                return Ok(jwks.clone());
            }
            None if self.attempted_recently(*last_attempt) => {
                return Err(KeyDiscoveryError::Backoff);
            }
            _ => {}
        }

        *last_attempt = Some(Instant::now());
        match self.fetch_and_cache().await {
            Ok(jwks) => Ok(jwks),
            Err(e) => match cached {
                Some((jwks, _)) => {
                    warn!(jwks_uri = %self.jwks_uri, error = %e, "Signing key refresh failed, keeping cached keys");
                    Ok(jwks)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_and_cache(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching signing keys");

        let response = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| KeyDiscoveryError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyDiscoveryError::Status(status.as_u16()));
        }

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(self.default_ttl);

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| KeyDiscoveryError::Parse(e.to_string()))?;
        let jwks = Arc::new(jwks);

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            ttl_secs = ttl.as_secs(),
            "Fetched signing keys"
        );

        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
            ttl,
        });

        Ok(jwks)
    }
}

#[async_trait]
impl KeySource for JwksClient {
    async fn keys(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_fresh() {
                    self.spawn_background_refresh();
                }
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_inline(false).await
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        self.fetch_inline(true).await
    }
}

/// Fixed key set that never changes
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    jwks: Arc<JwkSet>,
}

impl StaticKeySource {
    pub fn new(jwks: JwkSet) -> Self {
        Self {
            jwks: Arc::new(jwks),
        }
    }

    /// Parse a JWKS document (`{"keys": [...]}`)
    pub fn from_json(json: &str) -> Result<Self, KeyDiscoveryError> {
        let jwks: JwkSet =
            serde_json::from_str(json).map_err(|e| KeyDiscoveryError::Parse(e.to_string()))?;
        Ok(Self::new(jwks))
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn keys(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        Ok(self.jwks.clone())
    }

    async fn refresh(&self) -> Result<Arc<JwkSet>, KeyDiscoveryError> {
        Ok(self.jwks.clone())
    }
}

/// HTTPS anywhere, plain HTTP only for loopback
fn is_allowed_endpoint(uri: &str) -> bool {
    if uri.starts_with("https://") {
        return true;
    }
    ["http://localhost", "http://127.0.0.1", "http://[::1]"]
        .iter()
        .any(|prefix| {
            uri.strip_prefix(prefix)
                .map(|rest| rest.is_empty() || rest.starts_with(':') || rest.starts_with('/'))
                .unwrap_or(false)
        })
}

/// Extract `max-age` from a `Cache-Control` header value
fn parse_max_age(header: &str) -> Option<Duration> {
    header
        .split(',')
        .map(str::trim)
        .find_map(|directive| {
            let (name, value) = directive.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("max-age") {
                return None;
            }
            value.trim().trim_matches('"').parse().ok()
        })
        .map(Duration::from_secs)
}
