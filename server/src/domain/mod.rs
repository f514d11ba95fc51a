//! Domain logic for view statistics and creator settlement
//!
//! - `statistics` - Watch record validation and multi-period aggregation
//! - `settlement` - Tiered rate resolution and cumulative settlement
//! - `views` - Windowed view counting and its per-minute sync
//! - `pipeline` - Daily aggregation + settlement batch

pub mod pipeline;
pub mod settlement;
pub mod statistics;
pub mod views;

pub use pipeline::{BatchSummary, ContentFailure, DailyPipeline, PipelineStores};
pub use views::{ViewCountSyncCoordinator, WindowedViewCounter};
