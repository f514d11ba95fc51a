//! Repository traits for the durable store
//!
//! One trait per aggregate, exposing only the reads and writes the domain
//! services need. SQLite implements all of them for `Arc<SqliteService>`;
//! tests substitute small doubles to inject failures.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::data::error::DataError;
use crate::data::types::{
    AppliedWindow, NewSettlementRate, NewWatchRecord, PeriodKind, PeriodStatistic,
    PeriodStatisticRow, PreviousSettlementSnapshot, RawWatchRecord, SettlementRate,
    SettlementResult, SettlementType,
};

// ============================================================================
// Watch Records
// ============================================================================

/// Source of raw per-member daily watch records
#[async_trait]
pub trait WatchRecordRepository: Send + Sync {
    /// Record a watch event
    async fn insert_watch_record(&self, record: &NewWatchRecord) -> Result<i64, DataError>;

    /// All records of one day, unvalidated
    async fn list_watch_records_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<RawWatchRecord>, DataError>;

    /// Records of one content within `[from, to]`, unvalidated
    async fn list_watch_records_for_content(
        &self,
        content_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawWatchRecord>, DataError>;

    /// Lifetime ad views of a content through `through`, eligible records only
    async fn ad_views_through(&self, content_id: &str, through: NaiveDate)
    -> Result<i64, DataError>;
}

// ============================================================================
// Rates
// ============================================================================

/// Settlement rate table
#[async_trait]
pub trait RateRepository: Send + Sync {
    /// Every tier of a settlement type
    async fn list_rates(&self, settlement_type: SettlementType)
    -> Result<Vec<SettlementRate>, DataError>;

    /// Tiers matching `views` at `as_of`; the caller applies the tie-break
    async fn find_candidate_rates(
        &self,
        settlement_type: SettlementType,
        views: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SettlementRate>, DataError>;

    /// Add a tier
    async fn insert_rate(&self, rate: &NewSettlementRate) -> Result<i64, DataError>;
}

// ============================================================================
// Statistics
// ============================================================================

/// Append-only store of period statistics
#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// Append one run's rows atomically
    async fn insert_statistics(
        &self,
        run_id: &str,
        statistics: &[PeriodStatistic],
    ) -> Result<Vec<i64>, DataError>;

    /// Current row for a (content, period, bucket)
    async fn latest_statistic(
        &self,
        content_id: &str,
        period: PeriodKind,
        bucket_date: NaiveDate,
    ) -> Result<Option<PeriodStatisticRow>, DataError>;
}

// ============================================================================
// Settlements
// ============================================================================

/// Append-only store of settlements
#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn insert_settlement(
        &self,
        run_id: &str,
        result: &SettlementResult,
    ) -> Result<i64, DataError>;

    /// What was already paid out before `before` (zero for a first settlement)
    async fn previous_snapshot(
        &self,
        content_id: &str,
        before: NaiveDate,
    ) -> Result<PreviousSettlementSnapshot, DataError>;
}

// ============================================================================
// View Totals
// ============================================================================

/// Durable lifetime view totals
#[async_trait]
pub trait ViewTotalRepository: Send + Sync {
    /// Additively apply one window's counts, all-or-nothing
    ///
    /// Must be safe to call again for a window that was already applied.
    async fn apply_increments(
        &self,
        window_id: i64,
        counts: &HashMap<String, i64>,
    ) -> Result<AppliedWindow, DataError>;

    /// Lifetime views as of the end of `as_of`
    async fn accumulated_views(&self, content_id: &str, as_of: NaiveDate)
    -> Result<i64, DataError>;

    /// Current lifetime views
    async fn total_views(&self, content_id: &str) -> Result<i64, DataError>;
}
