//! Redis-backed distributed lock manager
//!
//! Acquire is `SET key token NX PX lease`. Release deletes the key only if it
//! still holds the caller's token, so a holder whose lease lapsed cannot free
//! a lock that another instance has since taken.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;

use super::error::LockError;
use super::{LockGuard, LockManager};

/// Compare-and-delete
const RELEASE_IF_OWNER: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

pub struct RedisLockManager {
    pool: Pool,
}

impl RedisLockManager {
    /// Build on an existing pool (normally the cache's)
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_acquire(
        &self,
        scope: &str,
        lease: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        let lease_ms: u64 = lease.as_millis().try_into().unwrap_or(u64::MAX).max(1);
        let guard = LockGuard::new(scope, lease);

        let mut conn = self.pool.get().await?;
        let reply: Option<String> = deadpool_redis::redis::cmd("SET")
            .arg(scope)
            .arg(guard.token())
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| guard))
    }

    async fn release(&self, guard: &LockGuard) -> Result<bool, LockError> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = deadpool_redis::redis::cmd("EVAL")
            .arg(RELEASE_IF_OWNER)
            .arg(1)
            .arg(guard.scope())
            .arg(guard.token())
            .query_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
