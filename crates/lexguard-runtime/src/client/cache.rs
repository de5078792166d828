//! Short-lived cache of stored analyses.
//!
//! Report pages for the same document re-fetch the same key on every mount.
//! Only bodies that classify as a successful analysis are kept; absent and
//! failed states are always re-read so progress made elsewhere shows up.
//!
//! A fetch that was already in flight when `process` or `invalidate` ran
//! does not store its body: it may describe the analysis from before the run.

use async_trait::async_trait;
use lexguard_core::{classify_fetch_response, AnalysisKey};
use moka::future::Cache;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{AnalysisClient, ClientError};

/// Caches successful `fetch_analysis` bodies per key.
pub struct CachedAnalysisClient<C> {
    inner: C,
    cache: Cache<AnalysisKey, JsonValue>,
    /// Bumped on every invalidation
    epoch: AtomicU64,
}

impl<C: AnalysisClient> CachedAnalysisClient<C> {
    pub fn new(inner: C, max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            cache,
            epoch: AtomicU64::new(0),
        }
    }

    /// Drop the cached body for one key.
    pub async fn invalidate(&self, key: &AnalysisKey) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(key).await;
    }
}

#[async_trait]
impl<C: AnalysisClient> AnalysisClient for CachedAnalysisClient<C> {
    async fn fetch_analysis(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        if let Some(body) = self.cache.get(key).await {
            tracing::debug!(key = %key, "Analysis cache hit");
            return Ok(body);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let body = self.inner.fetch_analysis(key).await?;
        if !classify_fetch_response(&body).outcome.is_success() {
            return Ok(body);
        }

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(key = %key, "Cache invalidated during fetch, not storing");
            return Ok(body);
        }
        self.cache.insert(key.clone(), body.clone()).await;
        // An invalidation may have slipped in between the check and the insert.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.cache.invalidate(key).await;
        }
        Ok(body)
    }

    async fn process(&self, key: &AnalysisKey) -> Result<JsonValue, ClientError> {
        self.invalidate(key).await;
        let result = self.inner.process(key).await;
        self.invalidate(key).await;
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexguard_core::AgentType;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    struct CountingClient {
        body: JsonValue,
        fetches: AtomicUsize,
    }

    impl CountingClient {
        fn new(body: JsonValue) -> Self {
            Self {
                body,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisClient for CountingClient {
        async fn fetch_analysis(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }

        async fn process(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            Ok(json!({"success": true, "data": {"summary": "fresh"}}))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn cached(body: JsonValue) -> CachedAnalysisClient<CountingClient> {
        CachedAnalysisClient::new(CountingClient::new(body), 100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_success_is_served_from_cache() {
        let client = cached(json!({"success": true, "data": {"summary": "ok"}}));
        let key = AnalysisKey::new("1", AgentType::Summary);

        client.fetch_analysis(&key).await.unwrap();
        let body = client.fetch_analysis(&key).await.unwrap();

        assert_eq!(body["data"]["summary"], "ok");
        assert_eq!(client.inner.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_is_never_cached() {
        let client = cached(json!({"success": false, "data": null, "error": null}));
        let key = AnalysisKey::new("1", AgentType::Summary);

        client.fetch_analysis(&key).await.unwrap();
        client.fetch_analysis(&key).await.unwrap();

        assert_eq!(client.inner.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_process_invalidates_key() {
        let client = cached(json!({"success": true, "data": {"summary": "old"}}));
        let key = AnalysisKey::new("1", AgentType::Summary);
        let other = AnalysisKey::new("1", AgentType::Risk);

        client.fetch_analysis(&key).await.unwrap();
        client.fetch_analysis(&other).await.unwrap();
        client.process(&key).await.unwrap();
        client.fetch_analysis(&key).await.unwrap();
        client.fetch_analysis(&other).await.unwrap();

        assert_eq!(client.inner.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let client = cached(json!({"success": true, "data": {"summary": "ok"}}));
        let key = AnalysisKey::new("1", AgentType::Clause);

        client.fetch_analysis(&key).await.unwrap();
        client.invalidate(&key).await;
        client.fetch_analysis(&key).await.unwrap();

        assert_eq!(client.inner.fetches.load(Ordering::SeqCst), 2);
    }

    /// Fetches return the body as it was when the call started, then wait
    /// for the gate if one is set.
    struct GatedClient {
        summary: parking_lot::Mutex<&'static str>,
        gate: parking_lot::Mutex<Option<oneshot::Receiver<()>>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisClient for GatedClient {
        async fn fetch_analysis(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            let summary = *self.summary.lock();
            let gate = self.gate.lock().take();
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(json!({"success": true, "data": {"summary": summary}}))
        }

        async fn process(&self, _key: &AnalysisKey) -> Result<JsonValue, ClientError> {
            *self.summary.lock() = "new";
            Ok(json!({"success": true, "data": {"summary": "new"}}))
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_fetch_started_before_process_is_not_stored() {
        let (release, gate) = oneshot::channel();
        let inner = Arc::new(GatedClient {
            summary: parking_lot::Mutex::new("old"),
            gate: parking_lot::Mutex::new(Some(gate)),
            fetches: AtomicUsize::new(0),
        });
        let client = Arc::new(CachedAnalysisClient::new(
            inner.clone(),
            100,
            Duration::from_secs(60),
        ));
        let key = AnalysisKey::new("1", AgentType::Risk);

        let in_flight = tokio::spawn({
            let client = client.clone();
            let key = key.clone();
            async move { client.fetch_analysis(&key).await }
        });
        while inner.fetches.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        client.process(&key).await.unwrap();
        release.send(()).unwrap();
        let stale = in_flight.await.unwrap().unwrap();
        assert_eq!(stale["data"]["summary"], "old");

        let body = client.fetch_analysis(&key).await.unwrap();
        assert_eq!(body["data"]["summary"], "new");
        assert_eq!(inner.fetches.load(Ordering::SeqCst), 2);
    }
}
