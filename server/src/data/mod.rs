//! Data storage layer
//!
//! Provides storage services for the application:
//! - `sqlite` - Durable store for records, rates, totals, statistics and settlements
//! - `cache` - In-memory and Redis counters for windowed view counts
//! - `locks` - In-memory and Redis leased locks around sync cycles
//! - `types` - Shared data types
//! - `traits` - Per-aggregate repository traits
//! - `error` - Unified error type for the durable store

pub mod cache;
pub mod error;
pub mod locks;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteService;

pub use error::DataError;

pub use traits::{
    RateRepository, SettlementRepository, StatisticsRepository, ViewTotalRepository,
    WatchRecordRepository,
};
