//! Transport-level backoff for stored-analysis fetches.
//!
//! Only `fetch_analysis` is retried. It is a read and safe to repeat;
//! `process` starts a paid agent run and is never repeated behind the
//! caller's back.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use lexguard_core::AnalysisKey;
use serde_json::Value as JsonValue;

use super::{AnalysisClient, ClientError};
use crate::config::FetchRetryConfig;

/// Retries transient fetch failures with exponential backoff.
pub struct RetryingClient<C> {
    inner: C,
    policy: FetchRetryConfig,
}

impl<C: AnalysisClient> RetryingClient<C> {
    pub fn new(inner: C, policy: FetchRetryConfig) -> Self {
        Self { inner, policy }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.policy.min_delay)
            .with_max_times(self.policy.max_attempts.saturating_sub(1))
    }
}

#[async_trait]
impl<C: AnalysisClient> AnalysisClient for RetryingClient<C> {
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        (|| self.inner.fetch_analysis(key))
            .retry(self.backoff())
            .when(ClientError::is_transient)
            .notify(|err, delay| {
                tracing::warn!(
                    key = %key,
                    client = self.inner.name(),
                    error = %err,
                    delay = ?delay,
                    "Retrying analysis fetch"
                );
            })
            .await
    }

    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        self.inner.process(key).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexguard_core::AgentType;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FlakyClient {
        fetches: Mutex<VecDeque<Result<JsonValue, ClientError>>>,
        fetch_calls: AtomicUsize,
        process_calls: AtomicUsize,
    }

    impl FlakyClient {
        fn new(fetches: Vec<Result<JsonValue, ClientError>>) -> Self {
            Self {
                fetches: Mutex::new(fetches.into()),
                fetch_calls: AtomicUsize::new(0),
                process_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisClient for FlakyClient {
        async fn fetch_analysis(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetches
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Http("exhausted".into())))
        }

        async fn process(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::Http("connection reset".into()))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn policy(max_attempts: usize) -> FetchRetryConfig {
        FetchRetryConfig {
            max_attempts,
            min_delay: Duration::from_millis(10),
        }
    }

    fn key() -> AnalysisKey {
        AnalysisKey::new("1", AgentType::Risk)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_is_retried() {
        let client = RetryingClient::new(
            FlakyClient::new(vec![
                Err(ClientError::Timeout(Duration::from_secs(1))),
                Ok(serde_json::json!({"success": true, "data": {}})),
            ]),
            policy(3),
        );

        let body = client.fetch_analysis(&key()).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(client.inner.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let client = RetryingClient::new(FlakyClient::new(vec![]), policy(3));
        assert!(client.fetch_analysis(&key()).await.is_err());
        assert_eq!(client.inner.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let client = RetryingClient::new(
            FlakyClient::new(vec![Err(ClientError::Unauthorized)]),
            policy(5),
        );
        assert_eq!(
            client.fetch_analysis(&key()).await,
            Err(ClientError::Unauthorized)
        );
        assert_eq!(client.inner.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_is_never_retried() {
        let client = RetryingClient::new(FlakyClient::new(vec![]), policy(5));
        assert!(client.process(&key()).await.is_err());
        assert_eq!(client.inner.process_calls.load(Ordering::SeqCst), 1);
    }
}
