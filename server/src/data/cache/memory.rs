//! In-memory cache implementation using dashmap
//!
//! Counters live in a `DashMap` and are updated through the entry API so
//! concurrent increments to the same key never lose an update. Expired
//! counters are swept opportunistically every 256 increments.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::CacheBackend;
use super::error::CacheError;

/// TTL used when the caller does not supply one
const DEFAULT_COUNTER_TTL: Duration = Duration::from_secs(60);

/// Counter entry with its absolute expiry
struct CounterEntry {
    count: AtomicI64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory cache implementation
///
/// Single-process only: two server instances using the memory backend keep
/// independent counters. Use the Redis backend for multi-instance deployments.
pub struct InMemoryCache {
    counters: DashMap<String, CounterEntry>,
    /// Counter for cleanup scheduling (increments on every incr operation)
    cleanup_ops: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            cleanup_ops: AtomicU64::new(0),
        }
    }

    /// Clean up expired counters (called periodically)
    fn cleanup_expired_counters(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| entry.is_live(now));
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn incr_by(
        &self,
        key: &str,
        amount: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        let expires_at = Some(now + ttl.unwrap_or(DEFAULT_COUNTER_TTL));

        // Entry API holds the shard lock, so check-and-reset is atomic
        let count = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if !counter.is_live(now) {
                    counter.count.store(amount, Ordering::SeqCst);
                    counter.expires_at = expires_at;
                    amount
                } else {
                    let current = counter.count.load(Ordering::SeqCst);
                    let next = current.checked_add(amount).ok_or_else(|| {
                        CacheError::Operation(format!("counter overflow on {}", key))
                    })?;
                    counter.count.store(next, Ordering::SeqCst);
                    next
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CounterEntry {
                    count: AtomicI64::new(amount),
                    expires_at,
                });
                amount
            }
        };

        let ops = self.cleanup_ops.fetch_add(1, Ordering::Relaxed);
        if ops.is_multiple_of(256) {
            self.cleanup_expired_counters();
        }

        Ok(count)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, CacheError> {
        let now = Instant::now();
        Ok(self
            .counters
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().is_live(now))
            .map(|entry| (entry.key().clone(), entry.value().count.load(Ordering::SeqCst)))
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheError> {
        let now = Instant::now();
        let mut count = 0u64;
        for key in keys {
            // Expired entries are removed too but not counted
            if self
                .counters
                .remove(key)
                .is_some_and(|(_, entry)| entry.is_live(now))
            {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        // In-memory is always healthy
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Live value of exactly `key`
    async fn value(cache: &InMemoryCache, key: &str) -> Option<i64> {
        cache
            .scan_prefix(key)
            .await
            .unwrap()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    #[tokio::test]
    async fn test_incr_by_accumulates() {
        let cache = InMemoryCache::new();
        let ttl = Some(Duration::from_secs(60));

        assert_eq!(cache.incr_by("counter", 1, ttl).await.unwrap(), 1);
        assert_eq!(cache.incr_by("counter", 4, ttl).await.unwrap(), 5);
        assert_eq!(value(&cache, "counter").await, Some(5));
    }

    #[tokio::test]
    async fn test_incr_expired_resets() {
        let cache = InMemoryCache::new();

        cache
            .incr_by("counter", 3, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(value(&cache, "counter").await, None);
        let count = cache
            .incr_by("counter", 1, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_incr_overflow_is_error() {
        let cache = InMemoryCache::new();
        cache.incr_by("counter", i64::MAX, None).await.unwrap();
        assert!(cache.incr_by("counter", 1, None).await.is_err());
        assert_eq!(value(&cache, "counter").await, Some(i64::MAX));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let cache = Arc::new(InMemoryCache::new());
        let mut handles = Vec::new();
        for _ in 0..64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    cache
                        .incr_by("hot", 1, Some(Duration::from_secs(60)))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(value(&cache, "hot").await, Some(64 * 50));
    }

    #[tokio::test]
    async fn test_scan_prefix_and_delete_many() {
        let cache = InMemoryCache::new();
        let ttl = Some(Duration::from_secs(60));
        cache.incr_by("vc:1:a", 2, ttl).await.unwrap();
        cache.incr_by("vc:1:b", 3, ttl).await.unwrap();
        cache.incr_by("vc:2:a", 7, ttl).await.unwrap();

        let mut found = cache.scan_prefix("vc:1:").await.unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![("vc:1:a".to_string(), 2), ("vc:1:b".to_string(), 3)]
        );

        let keys: Vec<String> = found.into_iter().map(|(k, _)| k).collect();
        assert_eq!(cache.delete_many(&keys).await.unwrap(), 2);
        assert!(cache.scan_prefix("vc:1:").await.unwrap().is_empty());
        assert_eq!(value(&cache, "vc:2:a").await, Some(7));
    }

    #[tokio::test]
    async fn test_scan_prefix_skips_expired() {
        let cache = InMemoryCache::new();
        cache
            .incr_by("vc:1:a", 1, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.scan_prefix("vc:1:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_nonexistent() {
        let cache = InMemoryCache::new();
        let keys = vec!["nonexistent".to_string()];
        assert_eq!(cache.delete_many(&keys).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_not_counted() {
        let cache = InMemoryCache::new();
        cache
            .incr_by("counter", 1, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let keys = vec!["counter".to_string()];
        assert_eq!(cache.delete_many(&keys).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_health_check_and_name() {
        let cache = InMemoryCache::new();
        assert!(cache.health_check().await.is_ok());
        assert_eq!(cache.backend_name(), "memory");
    }
}
