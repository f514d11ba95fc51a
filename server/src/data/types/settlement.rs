//! Settlement types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifetime revenue already settled for a content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousSettlementSnapshot {
    pub content_id: String,
    pub previous_total_content_revenue: i64,
    pub previous_total_ad_revenue: i64,
}

impl PreviousSettlementSnapshot {
    /// Snapshot for a content that has never been settled
    pub fn zero(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            previous_total_content_revenue: 0,
            previous_total_ad_revenue: 0,
        }
    }
}

/// Outcome of settling one content for one date
///
/// Amounts are minor currency units. `period_total_*` are lifetime-to-date
/// totals and `incremental_*` are what this settlement newly pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub content_id: String,
    pub settlement_date: NaiveDate,
    pub accumulated_views: i64,
    pub ad_view_count: i64,
    pub content_rate_id: i64,
    pub ad_rate_id: Option<i64>,
    pub period_total_content_revenue: i64,
    pub period_total_ad_revenue: i64,
    pub previous_content_revenue: i64,
    pub previous_ad_revenue: i64,
    pub incremental_content_revenue: i64,
    pub incremental_ad_revenue: i64,
}

impl SettlementResult {
    /// Snapshot this settlement leaves behind for the next run
    pub fn as_snapshot(&self) -> PreviousSettlementSnapshot {
        PreviousSettlementSnapshot {
            content_id: self.content_id.clone(),
            previous_total_content_revenue: self.period_total_content_revenue,
            previous_total_ad_revenue: self.period_total_ad_revenue,
        }
    }
}

/// Persisted settlement row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRow {
    pub id: i64,
    pub run_id: String,
    pub result: SettlementResult,
    pub created_at: i64,
}
