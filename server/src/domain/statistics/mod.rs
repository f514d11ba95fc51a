//! Watch record validation and multi-period aggregation

mod aggregator;
mod error;
mod validation;

pub use aggregator::{aggregate, bucket_date, period_to_date_start};
pub use error::StatisticsError;
pub use validation::{ValidationFailure, ValidationReport, validate, validate_all};
