//! Per-period statistics types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::PeriodKind;

/// Aggregated figures for one (content, period, bucket)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatistic {
    pub content_id: String,
    pub period: PeriodKind,
    /// Day itself, Monday of the week, 1st of the month or Jan 1
    pub bucket_date: NaiveDate,
    /// Qualifying watch records in the bucket up to the aggregation date
    pub view_count: i64,
    pub watch_time_seconds: i64,
    pub ad_view_count: i64,
    /// Lifetime views of the content as of the aggregation date
    pub accumulated_views: i64,
}

/// Persisted statistics row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStatisticRow {
    pub id: i64,
    pub run_id: String,
    pub statistic: PeriodStatistic,
    pub created_at: i64,
}
