//! Runtime configuration.
//!
//! Loaded from YAML or built with `Default`. Durations are human-readable
//! (`"120s"`, `"200ms"`).
//!
//! ```yaml
//! base_url: https://api.example.com
//! request_timeout: 90s
//! fetch_retry:
//!   max_attempts: 4
//!   min_delay: 250ms
//! cache:
//!   enabled: true
//!   ttl: 30s
//!   max_entries: 500
//! auto_fetch: true
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::client::ApiCredential;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the analysis client and controller.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Backend base URL, without a trailing slash
    pub base_url: String,

    /// Per-request timeout. Agent runs can take minutes.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    pub fetch_retry: FetchRetryConfig,

    pub cache: CacheConfig,

    /// Fetch stored analysis as soon as a key is attached
    pub auto_fetch: bool,

    /// Bearer token; falls back to the `LEXGUARD_API_TOKEN` environment variable
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(120),
            fetch_retry: FetchRetryConfig::default(),
            cache: CacheConfig::default(),
            auto_fetch: true,
            api_token: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("fetch_retry", &self.fetch_retry)
            .field("cache", &self.cache)
            .field("auto_fetch", &self.auto_fetch)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.fetch_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "fetch_retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slashes removed.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Resolve the bearer token from config or environment.
    pub fn credential(&self) -> Option<ApiCredential> {
        ApiCredential::resolve(self.api_token.as_deref())
    }
}

/// Backoff for the stored-analysis fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchRetryConfig {
    /// Total attempts, including the first
    pub max_attempts: usize,

    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
}

impl Default for FetchRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(30),
            max_entries: 1000,
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
