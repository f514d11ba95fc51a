//! Lock error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock connection error: {0}")]
    Connection(String),

    #[error("Lock operation failed: {0}")]
    Operation(String),

    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}
