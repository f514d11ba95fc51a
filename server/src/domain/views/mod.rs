//! Windowed view counting and its sync into durable totals

mod counter;
mod sync;
mod window;

pub use counter::{DrainedWindow, WindowedViewCounter};
pub use sync::{SyncError, SyncReport, ViewCountSyncCoordinator, WindowOutcome, WindowSync};
pub use window::{ViewWindow, WindowKey, WindowState};
