//! Mutual exclusion for the view count sync
//!
//! Locks are leases: if a holder crashes, the lock frees itself once the
//! lease elapses. Every guard carries a random token and release is
//! compare-and-delete on that token.
//!
//! Backends:
//! - In-memory (single process) - uses dashmap
//! - Redis (shared between instances) - reuses the cache's connection pool

mod error;
mod memory;
mod redis;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use error::LockError;
pub use memory::MemoryLockManager;
pub use redis::RedisLockManager;

use crate::core::constants::LOCK_RETRY_INTERVAL_MS;
use crate::data::cache::CacheService;

/// Proof of a held lock
#[derive(Debug, Clone)]
pub struct LockGuard {
    scope: String,
    token: String,
    acquired_at: Instant,
    lease: Duration,
}

impl LockGuard {
    fn new(scope: &str, lease: Duration) -> Self {
        Self {
            scope: scope.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            acquired_at: Instant::now(),
            lease,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the lease has run out (another holder may now own the scope)
    pub fn lease_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.lease
    }
}

/// Lock backend
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Single non-blocking acquisition attempt
    ///
    /// Returns `Ok(None)` when the scope is held by someone else.
    async fn try_acquire(&self, scope: &str, lease: Duration)
    -> Result<Option<LockGuard>, LockError>;

    /// Release a held lock; `false` when the guard no longer owns it
    async fn release(&self, guard: &LockGuard) -> Result<bool, LockError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}

/// Lock service adding bounded waits and scoped execution on top of a backend
#[derive(Clone)]
pub struct LockService {
    backend: Arc<dyn LockManager>,
}

impl std::fmt::Debug for LockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl LockService {
    /// Pick the backend matching the cache: Redis locks when the cache is Redis
    pub fn for_cache(cache: &CacheService) -> Self {
        match cache.redis_pool() {
            Some(pool) => {
                tracing::debug!("Using Redis lock manager");
                Self::new(Arc::new(RedisLockManager::new(pool.clone())))
            }
            None => {
                tracing::debug!("Using in-memory lock manager");
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLockManager::new()))
    }

    pub fn new(backend: Arc<dyn LockManager>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    /// Try to acquire `scope`, polling until `wait` elapses
    pub async fn acquire(
        &self,
        scope: &str,
        wait: Duration,
        lease: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        if lease.is_zero() {
            return Err(LockError::Operation("lease must be positive".to_string()));
        }

        let deadline = Instant::now() + wait;
        let retry = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);
        loop {
            if let Some(guard) = self.backend.try_acquire(scope, lease).await? {
                tracing::trace!(scope, "Lock acquired");
                return Ok(Some(guard));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(retry.min(deadline - now)).await;
        }
    }

    /// Release a held lock
    pub async fn release(&self, guard: &LockGuard) -> Result<bool, LockError> {
        self.backend.release(guard).await
    }

    /// Run `f` while holding `scope`
    ///
    /// Returns `Ok(None)` without running `f` when the lock could not be
    /// acquired within `wait`. Once acquired, the lock is released after `f`
    /// completes whatever it returns; a failed release is logged and left to
    /// lease expiry.
    pub async fn with_lock<T, F, Fut>(
        &self,
        scope: &str,
        wait: Duration,
        lease: Duration,
        f: F,
    ) -> Result<Option<T>, LockError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let Some(guard) = self.acquire(scope, wait, lease).await? else {
            return Ok(None);
        };

        let output = f().await;

        if guard.lease_expired() {
            tracing::warn!(
                scope,
                lease_ms = lease.as_millis() as u64,
                "Lock lease expired before the guarded work finished"
            );
        }
        match self.release(&guard).await {
            Ok(true) => tracing::trace!(scope, "Lock released"),
            Ok(false) => tracing::debug!(scope, "Lock already released or taken over"),
            Err(e) => tracing::warn!(scope, error = %e, "Lock release failed, relying on lease"),
        }

        Ok(Some(output))
    }
}
