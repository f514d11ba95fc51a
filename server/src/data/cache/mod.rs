//! Cache module
//!
//! Provides the counter cache behind the windowed view counter:
//! - In-memory (default) - uses dashmap
//! - Redis (optional) - uses deadpool-redis
//!
//! The Redis connection pool is exposed so the lock manager can share it.

mod backend;
mod error;
mod key;
mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::CacheKey;

use memory::InMemoryCache;

use crate::core::config::{CacheBackendType, CacheConfig};

/// Cache service providing access to the configured counter backend
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    redis_pool: Option<deadpool_redis::Pool>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    /// Create a new cache service from configuration
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!("Initializing in-memory cache");
                Ok(Self::in_memory())
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                let cache = redis::RedisCache::new(url)?;
                let pool = cache.pool().clone();
                let service = Self {
                    backend: Arc::new(cache),
                    redis_pool: Some(pool),
                };
                // Pool connects lazily
                service.health_check().await?;
                tracing::debug!("Redis cache connected");
                Ok(service)
            }
        }
    }

    /// In-process cache (single instance deployments and tests)
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryCache::new()))
    }

    /// Wrap an arbitrary backend
    pub fn from_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            redis_pool: None,
        }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Redis pool when the Redis backend is active
    pub fn redis_pool(&self) -> Option<&deadpool_redis::Pool> {
        self.redis_pool.as_ref()
    }

    // =========================================================================
    // Counter operations
    // =========================================================================

    /// Atomic increment by `amount`; TTL applies on creation only
    pub async fn incr_by(
        &self,
        key: &str,
        amount: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        self.backend.incr_by(key, amount, ttl).await
    }

    /// All live counters under a key prefix
    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, i64)>, CacheError> {
        self.backend.scan_prefix(prefix).await
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Delete a batch of keys
    pub async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.backend.delete_many(keys).await
    }

    /// Round trip to the backend; fails when Redis is unreachable
    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.backend.health_check().await
    }
}
