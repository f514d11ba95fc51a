//! Settlement error types

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::data::error::DataError;
use crate::data::types::{PeriodKind, SettlementType};
use crate::domain::statistics::StatisticsError;

#[derive(Error, Debug)]
pub enum SettlementError {
    /// No tier covers the view count at the instant
    #[error("No {settlement_type} rate for {views} views at {as_of}")]
    RateNotFound {
        settlement_type: SettlementType,
        views: i64,
        as_of: DateTime<Utc>,
    },

    /// Lifetime revenue fell below what was already paid out
    #[error(
        "Negative incremental {settlement_type} revenue for {content_id}: total {period_total} < previously paid {previous}"
    )]
    NegativeIncrementalRevenue {
        content_id: String,
        settlement_type: SettlementType,
        period_total: i64,
        previous: i64,
    },

    #[error("Revenue overflow for {content_id}: {views} views x rate {rate_value}")]
    Overflow {
        content_id: String,
        views: i64,
        rate_value: i64,
    },

    #[error(
        "Revenue overflow for {content_id}: {settlement_type} total {period_total} minus previously paid {previous}"
    )]
    IncrementOverflow {
        content_id: String,
        settlement_type: SettlementType,
        period_total: i64,
        previous: i64,
    },

    /// Settlement only runs off DAILY statistics
    #[error("Cannot settle {content_id} from a {period} statistic")]
    NotDaily {
        content_id: String,
        period: PeriodKind,
    },

    #[error(transparent)]
    Statistics(#[from] StatisticsError),

    #[error(transparent)]
    Data(#[from] DataError),
}
