//! Cache backend trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Cache backend trait
///
/// Defines the counter-oriented interface the view count pipeline needs.
/// Both in-memory and Redis backends implement this trait.
///
/// # Consistency Notes
///
/// `incr_by` is atomic per key under any number of concurrent writers.
/// `scan_prefix` is a point-in-time best-effort listing: keys created while a
/// scan is in progress may or may not be included. Callers that need a stable
/// view must only scan key ranges that no longer receive writes.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Atomically add `amount` to a counter, creating it if missing
    ///
    /// The TTL is applied only when the counter is created, so later
    /// increments never extend its lifetime. Returns the new value.
    async fn incr_by(&self, key: &str, amount: i64, ttl: Option<Duration>)
    -> Result<i64, CacheError>;

    /// List every live counter whose key starts with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, CacheError>;

    /// Delete a batch of keys, returning how many existed
    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Health check (validates connection)
    async fn health_check(&self) -> Result<(), CacheError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
