use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_REALM_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REALM_FETCH_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to build realm HTTP client: {0}")]
    HttpClient(String),
    #[error("failed to read role permission map '{path}': {reason}")]
    PermissionMap { path: String, reason: String },
}

/// Runtime configuration for the resource guard.
///
/// Built once at startup and never mutated afterwards; the guard shares it
/// behind an `Arc` across requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// When set, the only token string that may authenticate.
    pub static_token: Option<String>,
    /// Issuer whose key is configured locally instead of fetched.
    pub static_issuer: Option<String>,
    /// Key material (PEM, base64 DER or JWK JSON) for `static_issuer`.
    pub static_public_key: Option<String>,
    /// Realm endpoint URLs; a token whose issuer equals one of these has its
    /// key fetched from that URL.
    pub realms: Vec<String>,
    /// Authenticate every request as `static_token`, whatever was presented.
    pub disable_auth: bool,
    /// Expected audience. Presence of `aud` is always required; its value is
    /// only compared when this is set.
    pub audience: Option<String>,
    /// Allowable clock skew in seconds while decoding.
    pub leeway_seconds: u32,
    #[serde(with = "duration_millis")]
    pub realm_fetch_timeout: Duration,
    pub realm_fetch_attempts: u32,
    /// Cache fetched realm keys for this long. `None` re-fetches on every request.
    #[serde(with = "optional_duration_secs")]
    pub realm_key_ttl: Option<Duration>,
    /// Realm reported in `WWW-Authenticate` challenges.
    pub realm_name: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            static_token: None,
            static_issuer: None,
            static_public_key: None,
            realms: Vec::new(),
            disable_auth: false,
            audience: None,
            leeway_seconds: 30,
            realm_fetch_timeout: DEFAULT_REALM_FETCH_TIMEOUT,
            realm_fetch_attempts: DEFAULT_REALM_FETCH_ATTEMPTS,
            realm_key_ttl: None,
            realm_name: None,
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static_token(mut self, token: impl Into<String>) -> Self {
        self.static_token = Some(token.into());
        self
    }

    pub fn with_static_key(mut self, issuer: impl Into<String>, key: impl Into<String>) -> Self {
        self.static_issuer = Some(issuer.into());
        self.static_public_key = Some(key.into());
        self
    }

    pub fn with_realm(mut self, url: impl Into<String>) -> Self {
        self.realms.push(url.into());
        self
    }

    pub fn with_disable_auth(mut self, disable: bool) -> Self {
        self.disable_auth = disable;
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_realm_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.realm_fetch_timeout = timeout;
        self
    }

    pub fn with_realm_fetch_attempts(mut self, attempts: u32) -> Self {
        self.realm_fetch_attempts = attempts.max(1);
        self
    }

    pub fn with_realm_key_ttl(mut self, ttl: Duration) -> Self {
        self.realm_key_ttl = Some(ttl);
        self
    }

    pub fn with_realm_name(mut self, name: impl Into<String>) -> Self {
        self.realm_name = Some(name.into());
        self
    }

    /// Load configuration from `AUTH_*` environment variables. Unset
    /// variables keep their defaults; malformed numbers and flags are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            static_token: non_empty("AUTH_STATIC_TOKEN"),
            static_issuer: non_empty("AUTH_STATIC_ISSUER"),
            static_public_key: non_empty("AUTH_STATIC_PUBLIC_KEY"),
            audience: non_empty("AUTH_AUDIENCE"),
            realm_name: non_empty("AUTH_REALM_NAME"),
            ..Self::default()
        };

        if let Some(realms) = non_empty("AUTH_REALMS") {
            config.realms = realms
                .split(',')
                .map(str::trim)
                .filter(|realm| !realm.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(value) = non_empty("AUTH_DISABLE") {
            config.disable_auth = parse_flag("AUTH_DISABLE", &value)?;
        }
        if let Some(value) = non_empty("AUTH_LEEWAY_SECONDS") {
            config.leeway_seconds = parse_number("AUTH_LEEWAY_SECONDS", &value)?;
        }
        if let Some(value) = non_empty("AUTH_REALM_TIMEOUT_MS") {
            config.realm_fetch_timeout =
                Duration::from_millis(parse_number("AUTH_REALM_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = non_empty("AUTH_REALM_ATTEMPTS") {
            let attempts: u32 = parse_number("AUTH_REALM_ATTEMPTS", &value)?;
            config.realm_fetch_attempts = attempts.max(1);
        }
        if let Some(value) = non_empty("AUTH_REALM_KEY_TTL_SECONDS") {
            let secs: u64 = parse_number("AUTH_REALM_KEY_TTL_SECONDS", &value)?;
            config.realm_key_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
    })
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.filter(|secs| *secs > 0).map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_defaults_when_unset() {
        let config = GuardConfig::from_lookup(lookup(&[])).expect("config");
        assert!(config.static_token.is_none());
        assert!(config.realms.is_empty());
        assert!(!config.disable_auth);
        assert_eq!(config.leeway_seconds, 30);
        assert_eq!(config.realm_fetch_timeout, DEFAULT_REALM_FETCH_TIMEOUT);
        assert!(config.realm_key_ttl.is_none());
    }

    #[test]
    fn env_parses_realms_and_flags() {
        let config = GuardConfig::from_lookup(lookup(&[
            ("AUTH_REALMS", "https://a.example/realms/x, https://b.example/realms/y,"),
            ("AUTH_DISABLE", "true"),
            ("AUTH_STATIC_TOKEN", "T"),
            ("AUTH_REALM_TIMEOUT_MS", "250"),
            ("AUTH_REALM_KEY_TTL_SECONDS", "60"),
        ]))
        .expect("config");
        assert_eq!(
            config.realms,
            vec!["https://a.example/realms/x", "https://b.example/realms/y"]
        );
        assert!(config.disable_auth);
        assert_eq!(config.static_token.as_deref(), Some("T"));
        assert_eq!(config.realm_fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.realm_key_ttl, Some(Duration::from_secs(60)));
    }

    #[test]
    fn env_rejects_bad_flag() {
        let err = GuardConfig::from_lookup(lookup(&[("AUTH_DISABLE", "maybe")]))
            .expect_err("should reject");
        assert!(matches!(err, ConfigError::InvalidValue { key: "AUTH_DISABLE", .. }));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: GuardConfig = serde_json::from_value(serde_json::json!({
            "static_issuer": "https://idp.example/realms/main",
            "static_public_key": "KEY",
            "realm_fetch_timeout": 1500,
            "realm_key_ttl": 0
        }))
        .expect("deserialize");
        assert_eq!(config.static_public_key.as_deref(), Some("KEY"));
        assert_eq!(config.realm_fetch_timeout, Duration::from_millis(1500));
        assert!(config.realm_key_ttl.is_none());
        assert_eq!(config.realm_fetch_attempts, DEFAULT_REALM_FETCH_ATTEMPTS);
    }
}
