//! Redis-compatible cache implementation using deadpool-redis
//!
//! The connection pool is shared with the Redis lock manager. Any server
//! speaking the Redis protocol works (Redis, Valkey, Dragonfly).
//!
//! # URL Formats
//!
//! ```text
//! redis://[user:password@]host:port[/db]
//! rediss://[user:password@]host:port[/db]  (TLS)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};

use super::backend::CacheBackend;
use super::error::CacheError;

/// Redis-compatible cache implementation
///
/// Uses connection pooling via deadpool-redis for efficient connection management.
pub struct RedisCache {
    pool: Pool,
    /// URL with the password masked, for logs and errors
    url: String,
}

impl RedisCache {
    /// Build the pool for `redis_url`
    ///
    /// Connections are opened lazily; call `health_check` to validate the
    /// server is reachable.
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let url = sanitize_redis_url(redis_url);

        let mut config = Config::from_url(redis_url);
        // Configure pool with reasonable defaults for production
        config.pool = Some(deadpool_redis::PoolConfig {
            max_size: 32, // Allow more concurrent connections than default (16)
            timeouts: deadpool_redis::Timeouts {
                // Timeout for getting a connection from the pool
                wait: Some(Duration::from_secs(5)),
                // Timeout for creating a new connection
                create: Some(Duration::from_secs(5)),
                // Timeout for recycling connections (health check)
                recycle: Some(Duration::from_secs(5)),
            },
            ..Default::default()
        });
        let pool = config.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            CacheError::Connection(format!("Failed to create Redis pool for {url}: {e}"))
        })?;

        Ok(Self { pool, url })
    }

    /// Connection pool (shared with the Redis lock manager)
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

/// Sanitize Redis URL for logging (removes password)
fn sanitize_redis_url(url: &str) -> String {
    // Parse URL and mask password if present
    // Use rfind('@') to handle passwords that may contain '@'
    if let Some(at_pos) = url.rfind('@') {
        // Find the protocol separator (handles redis:// and rediss://)
        let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
        // Find the colon after username (must be after scheme://)
        if let Some(colon_pos) = url[scheme_end..at_pos].find(':') {
            let abs_colon = scheme_end + colon_pos;
            let prefix = &url[..abs_colon + 1];
            let suffix = &url[at_pos..];
            return format!("{prefix}***{suffix}");
        }
    }
    url.to_string()
}

/// INCRBY that sets the expiry only when the key has none yet
const INCR_BY_WITH_TTL: &str = r#"
    local count = redis.call('INCRBY', KEYS[1], ARGV[1])
    if redis.call('PTTL', KEYS[1]) == -1 then
        redis.call('PEXPIRE', KEYS[1], ARGV[2])
    end
    return count
"#;

/// SCAN page size
const SCAN_COUNT: u64 = 200;

#[async_trait]
impl CacheBackend for RedisCache {
    async fn incr_by(
        &self,
        key: &str,
        amount: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        let mut conn = self.pool.get().await?;

        // Convert to milliseconds, minimum 1ms, default 60s
        let ttl_ms = ttl
            .map(|d| d.as_millis().try_into().unwrap_or(u64::MAX).max(1))
            .unwrap_or(60_000);

        let count: i64 = deadpool_redis::redis::cmd("EVAL")
            .arg(INCR_BY_WITH_TTL)
            .arg(1)
            .arg(key)
            .arg(amount)
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, CacheError> {
        let mut conn = self.pool.get().await?;
        let pattern = format!("{}*", escape_glob(prefix));
        let mut found = Vec::new();
        let mut cursor: u64 = 0;

        // SCAN is O(1) per call, safe for large keyspaces
        loop {
            let (new_cursor, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let values: Vec<Option<String>> = deadpool_redis::redis::cmd("MGET")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await?;
                // Keys that expired between SCAN and MGET come back as nil
                for (key, value) in keys.into_iter().zip(values) {
                    if let Some(count) = value.and_then(|v| v.parse::<i64>().ok()) {
                        found.push((key, count));
                    }
                }
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once across pages
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found.dedup_by(|a, b| a.0 == b.0);
        Ok(found)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await?;
        let deleted: u64 = deadpool_redis::redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(|e| {
            CacheError::Connection(format!(
                "Failed to get Redis connection from pool for {}: {e}",
                self.url
            ))
        })?;

        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| {
                CacheError::Connection(format!("Redis PING failed for {}: {e}", self.url))
            })?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Escape glob metacharacters so a literal prefix can be used with SCAN MATCH
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
