//! Shared data types
//!
//! Row and value types passed between the SQLite repositories and the
//! domain services.

mod enums;
mod rate;
mod settlement;
mod statistic;
mod view_total;
mod watch;

pub use enums::{CompletionStatus, PeriodKind, SettlementType};
pub use rate::{NewSettlementRate, SettlementRate};
pub use settlement::{PreviousSettlementSnapshot, SettlementResult, SettlementRow};
pub use statistic::{PeriodStatistic, PeriodStatisticRow};
pub use view_total::AppliedWindow;
pub use watch::{NewWatchRecord, RawWatchRecord, WatchRecord};
