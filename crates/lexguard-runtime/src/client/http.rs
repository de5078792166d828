//! HTTP implementation of [`AnalysisClient`] against the document gateway.
//!
//! - `GET  {base}/documents/{id}/analysis/{agent}` reads the stored analysis
//! - `POST {base}/documents/{id}/process/{agent}` runs the agent now
//!
//! Error responses carry a `detail` string, which becomes the error message.

use async_trait::async_trait;
use lexguard_core::AnalysisKey;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{analysis_path, process_path, AnalysisClient, ApiCredential, ClientError};
use crate::config::RuntimeConfig;

/// Analysis client backed by `reqwest`.
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
    credential: Option<ApiCredential>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpAnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnalysisClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<JsonValue>,
    message: Option<String>,
}

impl HttpAnalysisClient {
    pub fn new(config: &RuntimeConfig) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::NotConfigured(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::NotConfigured(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.normalized_base_url().to_string(),
            credential: config.credential(),
            timeout: config.request_timeout,
        })
    }

    pub fn with_credential(mut self, credential: ApiCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<JsonValue, ClientError> {
        let request = match &self.credential {
            // SECURITY: the token is only exposed here, at the point of use
            Some(credential) => request.header(reqwest::header::AUTHORIZATION, credential.bearer()),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        let url = format!("{}{}", self.base_url, analysis_path(key));
        tracing::debug!(key = %key, url = %url, "Fetching stored analysis");
        self.send(self.client.get(url)).await
    }

    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        let url = format!("{}{}", self.base_url, process_path(key));
        tracing::debug!(key = %key, url = %url, "Requesting agent run");
        self.send(self.client.post(url)).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ClientError {
    match status.as_u16() {
        401 | 403 => ClientError::Unauthorized,
        504 => ClientError::GatewayTimeout(error_message(body, status.canonical_reason())),
        code => ClientError::Api {
            status: code,
            message: error_message(body, status.canonical_reason()),
        },
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, reason: Option<&str>) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let from_body = parsed.and_then(|b| match b.detail {
        Some(JsonValue::String(s)) => Some(s),
        Some(other) if !other.is_null() => Some(other.to_string()),
        _ => b.message,
    });

    from_body
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .or_else(|| reason.map(str::to_string))
        .unwrap_or_else(|| "Request failed".to_string())
}
