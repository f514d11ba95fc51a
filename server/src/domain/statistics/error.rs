//! Statistics error types

use thiserror::Error;

use crate::data::types::PeriodKind;

#[derive(Error, Debug)]
pub enum StatisticsError {
    /// A period sum no longer fits in i64
    #[error("{field} overflow for {content_id} in {period} bucket")]
    Overflow {
        content_id: String,
        period: PeriodKind,
        field: &'static str,
    },
}
