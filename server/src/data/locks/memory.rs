//! In-memory (single process) lock manager

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::LockError;
use super::{LockGuard, LockManager};

struct Holder {
    token: String,
    expires_at: Instant,
}

/// Lease-based lock table for single-instance deployments and tests
#[derive(Default)]
pub struct MemoryLockManager {
    held: DashMap<String, Holder>,
}

impl MemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn try_acquire(
        &self,
        scope: &str,
        lease: Duration,
    ) -> Result<Option<LockGuard>, LockError> {
        let now = Instant::now();
        let guard = LockGuard::new(scope, lease);

        match self.held.entry(scope.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    return Ok(None);
                }
                // Previous holder's lease lapsed
                occupied.insert(Holder {
                    token: guard.token().to_string(),
                    expires_at: now + lease,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Holder {
                    token: guard.token().to_string(),
                    expires_at: now + lease,
                });
            }
        }

        Ok(Some(guard))
    }

    async fn release(&self, guard: &LockGuard) -> Result<bool, LockError> {
        Ok(self
            .held
            .remove_if(guard.scope(), |_, holder| holder.token == guard.token())
            .is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release_lock() {
        let manager = MemoryLockManager::new();
        let lease = Duration::from_secs(30);

        let guard = manager.try_acquire("scope:1", lease).await.unwrap().unwrap();
        assert!(manager.try_acquire("scope:1", lease).await.unwrap().is_none());

        assert!(manager.release(&guard).await.unwrap());
        assert!(manager.try_acquire("scope:1", lease).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let manager = MemoryLockManager::new();
        let lease = Duration::from_secs(30);
        assert!(manager.try_acquire("a", lease).await.unwrap().is_some());
        assert!(manager.try_acquire("b", lease).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let manager = MemoryLockManager::new();

        let stale = manager
            .try_acquire("scope", Duration::from_millis(1))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fresh = manager
            .try_acquire("scope", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        // The stale holder must not release the new holder's lock
        assert!(!manager.release(&stale).await.unwrap());
        let contender = manager
            .try_acquire("scope", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(contender.is_none());
        assert!(manager.release(&fresh).await.unwrap());
    }
}
