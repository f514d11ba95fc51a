//! Settlement rate table types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::SettlementType;

/// One tier of the settlement rate table
///
/// View bounds are inclusive; `max_views = None` is unbounded. Validity bounds
/// are inclusive; `applied_at = None` applies since forever and
/// `expired_at = None` never expires. `rate_value` is minor currency units
/// per view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRate {
    pub id: i64,
    pub settlement_type: SettlementType,
    pub min_views: i64,
    pub max_views: Option<i64>,
    pub applied_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub rate_value: i64,
}

/// Rate tier to insert
#[derive(Debug, Clone)]
pub struct NewSettlementRate {
    pub settlement_type: SettlementType,
    pub min_views: i64,
    pub max_views: Option<i64>,
    pub applied_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub rate_value: i64,
}
