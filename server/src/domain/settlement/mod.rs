//! Tiered rate resolution and cumulative settlement

mod calculator;
mod error;
mod rate;

pub use calculator::{SettlementCalculator, settle};
pub use error::SettlementError;
pub use rate::{
    CachedRateSource, RateOverlap, RateResolver, check_rate_overlaps, find_rate_overlaps,
    rate_matches, select_rate,
};
