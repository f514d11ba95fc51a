//! SQLite repositories
//!
//! Types (WatchRecord, SettlementRate, etc.) should be imported from `crate::data::types`.

#[cfg(test)]
pub mod catalog;
pub mod rate;
pub mod settlement;
pub mod statistic;
pub mod view_total;
pub mod watch_record;

pub use rate::{find_candidate_rates, insert_rate, list_rates};
pub use settlement::{insert_settlement, latest_before, previous_snapshot};
pub use statistic::{insert_statistics, latest_statistic};
pub use view_total::{accumulated_views, apply_increments, total_views};
pub use watch_record::{insert_watch_record, list_for_content, list_for_date, sum_ad_views_through};
