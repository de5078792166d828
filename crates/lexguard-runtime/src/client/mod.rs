//! The analysis backend boundary.
//!
//! [`AnalysisClient`] is the only place the runtime talks to the backend.
//! Implementations return the raw JSON body; classification into an
//! [`AnalysisOutcome`](lexguard_core::AnalysisOutcome) happens once, in the
//! controller.
//!
//! ## Security
//!
//! The HTTP client carries a bearer token through [`ApiCredential`], which
//! never prints its value.

use async_trait::async_trait;
use lexguard_core::AnalysisKey;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

mod cache;
mod retry;
pub mod secrets;

#[cfg(feature = "http")]
mod http;

pub use cache::CachedAnalysisClient;
pub use retry::RetryingClient;
pub use secrets::{ApiCredential, CredentialSource, API_TOKEN_ENV};

#[cfg(feature = "http")]
pub use http::HttpAnalysisClient;

/// Errors from the analysis backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Parse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway gave up on the agent; carries its explanation.
    #[error("{0} (gateway timeout)")]
    GatewayTimeout(String),

    #[error("Not authorized to access this document")]
    Unauthorized,

    #[error("Analysis client not configured: {0}")]
    NotConfigured(String),
}

impl ClientError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::Timeout(_) | ClientError::GatewayTimeout(_) => {
                true
            }
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Parse(_) | ClientError::Unauthorized | ClientError::NotConfigured(_) => {
                false
            }
        }
    }
}

/// Backend operations for one analysis key.
///
/// Both calls resolve to the backend's JSON body, including bodies that
/// describe a missing or failed analysis. Only transport-level problems and
/// non-2xx statuses are errors.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Fetch the latest stored analysis.
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError>;

    /// Run the agent over the document now.
    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError>;

    /// Client name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<C: AnalysisClient + ?Sized> AnalysisClient for std::sync::Arc<C> {
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        (**self).fetch_analysis(key).await
    }

    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        (**self).process(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<C: AnalysisClient + ?Sized> AnalysisClient for Box<C> {
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        (**self).fetch_analysis(key).await
    }

    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        (**self).process(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Path of the stored-analysis endpoint, relative to the base URL.
pub fn analysis_path(key: &AnalysisKey) -> String {
    format!("/documents/{}/analysis/{}", key.document_id, key.agent)
}

/// Path of the processing endpoint, relative to the base URL.
pub fn process_path(key: &AnalysisKey) -> String {
    format!("/documents/{}/process/{}", key.document_id, key.agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexguard_core::AgentType;

    #[test]
    fn test_endpoint_paths() {
        let key = AnalysisKey::new(7u64, AgentType::Draft);
        assert_eq!(analysis_path(&key), "/documents/7/analysis/draft");
        assert_eq!(process_path(&key), "/documents/7/process/draft");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Http("reset".into()).is_transient());
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ClientError::GatewayTimeout("agent slow".into()).is_transient());
        assert!(ClientError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!ClientError::Api {
            status: 404,
            message: "Document not found".into()
        }
        .is_transient());
        assert!(!ClientError::Unauthorized.is_transient());
        assert!(!ClientError::Parse("eof".into()).is_transient());
    }

    #[test]
    fn test_api_error_surfaces_backend_detail() {
        let err = ClientError::Api {
            status: 404,
            message: "Document not found".into(),
        };
        assert_eq!(err.to_string(), "Document not found (HTTP 404)");
    }
}
