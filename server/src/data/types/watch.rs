//! Watch record types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::CompletionStatus;

/// Watch record as stored, before eligibility validation
///
/// `member_known` / `content_known` report whether the referenced member and
/// content resolve in the catalog tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWatchRecord {
    pub id: i64,
    pub member_id: String,
    pub content_id: String,
    pub watched_date: NaiveDate,
    /// Seconds into the content at the last heartbeat
    pub last_viewed_position: i64,
    pub last_ad_view_count: i64,
    pub completion_status: CompletionStatus,
    pub member_known: bool,
    pub content_known: bool,
}

/// Watch record that passed eligibility validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRecord {
    pub member_id: String,
    pub content_id: String,
    pub watched_date: NaiveDate,
    pub last_viewed_position: i64,
    pub last_ad_view_count: i64,
}

/// New watch record (ingest and fixtures)
#[derive(Debug, Clone)]
pub struct NewWatchRecord {
    pub member_id: String,
    pub content_id: String,
    pub watched_date: NaiveDate,
    pub last_viewed_position: i64,
    pub last_ad_view_count: i64,
    pub completion_status: CompletionStatus,
}
