use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigError, GuardConfig};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum RealmFetchError {
    #[error("request to realm endpoint failed: {0}")]
    Transport(String),
    #[error("realm endpoint answered HTTP {0}")]
    Status(u16),
    #[error("realm endpoint returned malformed JSON: {0}")]
    Decode(String),
}

impl RealmFetchError {
    fn is_retryable(&self) -> bool {
        match self {
            RealmFetchError::Transport(_) => true,
            RealmFetchError::Status(status) => *status >= 500,
            RealmFetchError::Decode(_) => false,
        }
    }
}

/// Fetches the JSON description of a realm.
#[async_trait]
pub trait RealmFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, RealmFetchError>;
}

/// [`RealmFetcher`] over HTTP GET with a per-request timeout and bounded retries.
#[derive(Clone)]
pub struct HttpRealmFetcher {
    client: Client,
    attempts: u32,
}

impl HttpRealmFetcher {
    pub fn new(timeout: Duration, attempts: u32) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self::with_client(client, attempts))
    }

    pub fn with_client(client: Client, attempts: u32) -> Self {
        Self {
            client,
            attempts: attempts.max(1),
        }
    }

    pub fn from_config(config: &GuardConfig) -> Result<Self, ConfigError> {
        Self::new(config.realm_fetch_timeout, config.realm_fetch_attempts)
    }

    async fn fetch_once(&self, url: &str) -> Result<Value, RealmFetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RealmFetchError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(RealmFetchError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|err| RealmFetchError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RealmFetcher for HttpRealmFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, RealmFetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    debug!(realm = url, attempt, error = %err, "retrying realm fetch");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Clone)]
struct CachedKey {
    key: String,
    fetched_at: Instant,
}

/// Thread-safe, time-bounded store of keys fetched from realm endpoints.
#[derive(Clone)]
pub struct RealmKeyCache {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<String, CachedKey>>>,
}

impl RealmKeyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::default(),
        }
    }

    pub fn get(&self, issuer: &str) -> Option<String> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(issuer)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.key.clone())
    }

    pub fn insert(&self, issuer: impl Into<String>, key: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(
            issuer.into(),
            CachedKey {
                key: key.into(),
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.get(issuer).is_some()
    }
}

/// Maps a token issuer to the key material that verifies its tokens.
#[derive(Clone)]
pub struct RealmKeyResolver {
    static_issuer: Option<String>,
    static_key: Option<String>,
    realms: Vec<String>,
    fetcher: Arc<dyn RealmFetcher>,
    cache: Option<RealmKeyCache>,
}

impl RealmKeyResolver {
    pub fn new(config: &GuardConfig, fetcher: Arc<dyn RealmFetcher>) -> Self {
        Self {
            static_issuer: config.static_issuer.clone(),
            static_key: config.static_public_key.clone(),
            realms: config.realms.clone(),
            fetcher,
            cache: config.realm_key_ttl.map(RealmKeyCache::new),
        }
    }

    pub fn cache(&self) -> Option<&RealmKeyCache> {
        self.cache.as_ref()
    }

    /// Key material for `issuer`, or `None` when the issuer is unknown or its
    /// realm could not be read. Only realms equal to the issuer are contacted.
    pub async fn resolve(&self, issuer: &str) -> Option<String> {
        if self.static_issuer.as_deref() == Some(issuer) {
            return self.static_key.clone().filter(|key| !key.is_empty());
        }

        let realm = self.realms.iter().find(|realm| realm.as_str() == issuer)?;

        if let Some(key) = self.cache.as_ref().and_then(|cache| cache.get(issuer)) {
            debug!(realm = %realm, "using cached realm key");
            return Some(key);
        }

        let body = match self.fetcher.fetch_json(realm).await {
            Ok(body) => body,
            Err(err) => {
                warn!(realm = %realm, error = %err, "failed to fetch realm key");
                return None;
            }
        };

        let key = match body.get("public_key") {
            Some(Value::String(key)) if !key.is_empty() => key.clone(),
            _ => {
                warn!(realm = %realm, "realm response carries no public_key");
                return None;
            }
        };

        if let Some(cache) = &self.cache {
            cache.insert(issuer, key.clone());
        }
        Some(key)
    }
}
