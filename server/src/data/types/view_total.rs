//! Durable view total types

/// Result of applying one window's counts to durable storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedWindow {
    /// Contents whose counts were newly recorded
    pub inserted: u64,
    /// Contents already recorded for this window
    pub skipped: u64,
    /// Views added to the durable totals
    pub views: i64,
}
