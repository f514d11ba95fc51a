//! Cache-backed windowed view counter

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::window::{ViewWindow, WindowKey};
use crate::data::cache::{CacheError, CacheService};

/// Counts read from one closed window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainedWindow {
    /// Positive counts per content
    pub counts: HashMap<String, i64>,
    /// Every counter key found, including non-positive ones
    pub keys: Vec<String>,
}

impl DrainedWindow {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn total_views(&self) -> i64 {
        self.counts.values().fold(0i64, |acc, v| acc.saturating_add(*v))
    }
}

/// Per-(content, minute) view counter
///
/// Increments are atomic in the cache, so any number of concurrent callers
/// may hit the same key. Reading a window and clearing it are separate
/// calls: keys are removed only once their counts are durable.
#[derive(Clone)]
pub struct WindowedViewCounter {
    cache: Arc<CacheService>,
    ttl: Duration,
}

impl WindowedViewCounter {
    pub fn new(cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Add `count` views to the currently open window
    pub async fn increment(&self, content_id: &str, count: i64) -> Result<i64, CacheError> {
        self.increment_at(content_id, count, Utc::now()).await
    }

    /// Add `count` views to the window containing `at`
    pub async fn increment_at(
        &self,
        content_id: &str,
        count: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, CacheError> {
        if content_id.is_empty() {
            return Err(CacheError::Operation("content id must not be empty".into()));
        }
        if count <= 0 {
            return Err(CacheError::Operation(format!(
                "view increment must be positive, got {}",
                count
            )));
        }

        let key = WindowKey::new(ViewWindow::containing(at), content_id);
        self.cache
            .incr_by(&key.cache_key(), count, Some(self.ttl))
            .await
    }

    /// Read every counter of `window` without removing anything
    pub async fn drain(&self, window: ViewWindow) -> Result<DrainedWindow, CacheError> {
        let entries = self.cache.scan_prefix(&window.counter_prefix()).await?;
        let mut drained = DrainedWindow::default();

        for (key, value) in entries {
            let Some(parsed) = WindowKey::parse(window, &key) else {
                tracing::debug!(key = %key, "Ignoring malformed view counter key");
                continue;
            };
            if value > 0 {
                let slot = drained.counts.entry(parsed.content_id).or_default();
                *slot = slot.saturating_add(value);
            }
            drained.keys.push(key);
        }

        Ok(drained)
    }

    /// Remove the keys read by `drain`
    pub async fn clear(&self, drained: &DrainedWindow) -> Result<u64, CacheError> {
        if drained.keys.is_empty() {
            return Ok(0);
        }
        self.cache.delete_many(&drained.keys).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn counter() -> WindowedViewCounter {
        WindowedViewCounter::new(Arc::new(CacheService::in_memory()), Duration::from_secs(600))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_increments_sum_exactly() {
        let counter = counter();
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 5).unwrap();
        let callers = 4_000;

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment_at("c1", 1, at).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let drained = counter.drain(ViewWindow::containing(at)).await.unwrap();
        assert_eq!(drained.counts["c1"], callers);
        assert_eq!(drained.keys.len(), 1);
    }

    #[tokio::test]
    async fn test_increment_targets_open_window() {
        let counter = counter();
        let before = ViewWindow::containing(Utc::now());
        counter.increment("c1", 2).await.unwrap();
        let after = ViewWindow::containing(Utc::now());

        // A minute boundary may fall between the two clock reads
        let mut total = 0;
        for window in [before, after] {
            let drained = counter.drain(window).await.unwrap();
            total += drained.counts.get("c1").copied().unwrap_or(0);
            counter.clear(&drained).await.unwrap();
        }
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_windows_are_separate() {
        let counter = counter();
        let first = Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 59).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 14, 10, 31, 0).unwrap();
        counter.increment_at("c1", 2, first).await.unwrap();
        counter.increment_at("c2", 3, first).await.unwrap();
        counter.increment_at("c1", 7, second).await.unwrap();

        let drained = counter.drain(ViewWindow::containing(first)).await.unwrap();
        assert_eq!(drained.counts.len(), 2);
        assert_eq!(drained.total_views(), 5);

        let next = counter.drain(ViewWindow::containing(second)).await.unwrap();
        assert_eq!(next.counts["c1"], 7);
    }

    #[tokio::test]
    async fn test_drain_does_not_clear() {
        let counter = counter();
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 0).unwrap();
        let window = ViewWindow::containing(at);
        counter.increment_at("c1", 4, at).await.unwrap();

        let first = counter.drain(window).await.unwrap();
        let second = counter.drain(window).await.unwrap();
        assert_eq!(first, second);

        assert_eq!(counter.clear(&first).await.unwrap(), 1);
        assert!(counter.drain(window).await.unwrap().is_empty());
        assert_eq!(counter.clear(&DrainedWindow::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_increments_rejected() {
        let counter = counter();
        assert!(counter.increment("c1", 0).await.is_err());
        assert!(counter.increment("c1", -3).await.is_err());
        assert!(counter.increment("", 1).await.is_err());
    }
}
