//! Bearer token handling for the analysis backend.
//!
//! The token is wrapped in a [`SecretString`] as soon as it is read and is
//! only exposed when the `Authorization` header is built.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Environment variable consulted when no token is configured.
pub const API_TOKEN_ENV: &str = "LEXGUARD_API_TOKEN";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the runtime configuration file
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A bearer token for the analysis backend.
///
/// `Debug` and `Display` show `[REDACTED]` instead of the value.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
        }
    }

    /// Read the token from `env_var`, ignoring unset or blank values.
    pub fn from_env(env_var: &str) -> Option<Self> {
        std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment))
    }

    /// Use the configured token if present, else fall back to [`API_TOKEN_ENV`].
    pub fn resolve(configured: Option<&str>) -> Option<Self> {
        match configured.filter(|v| !v.trim().is_empty()) {
            Some(token) => Some(Self::new(token, CredentialSource::Config)),
            None => Self::from_env(API_TOKEN_ENV),
        }
    }

    /// Expose the token at the point of use. Never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self::new(self.expose(), self.source)
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API token from {} [REDACTED]", self.source)
    }
}
