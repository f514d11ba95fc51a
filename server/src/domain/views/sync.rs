//! Per-minute sync of closed view count windows into durable totals
//!
//! Each window goes drain -> apply -> clear under a lock scoped to that
//! window. Keys are cleared only after the durable apply succeeded, and the
//! apply itself is keyed by (content, window) so repeating it never double
//! counts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::counter::WindowedViewCounter;
use super::window::{ViewWindow, WindowState};
use crate::core::config::SyncConfig;
use crate::core::constants::VIEW_WINDOW_SECS;
use crate::data::cache::CacheError;
use crate::data::error::DataError;
use crate::data::locks::{LockError, LockService};
use crate::data::traits::ViewTotalRepository;
use crate::data::types::AppliedWindow;

/// Delay past the minute boundary before a scheduled cycle fires
const SYNC_GRACE_SECS: u64 = 1;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Another instance holds the window, or the wait ran out
    #[error("Sync lock for window {window} unavailable")]
    LockUnavailable { window: ViewWindow },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Durable apply failed; cache keys were kept
    #[error("Applying window {window} failed: {source}")]
    DurableApply {
        window: ViewWindow,
        #[source]
        source: DataError,
    },

    /// Counts are durable but the keys could not be removed
    #[error("Clearing window {window} failed: {source}")]
    Clear {
        window: ViewWindow,
        #[source]
        source: CacheError,
    },
}

/// Successful end state of one window's sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// No counters present
    Empty,
    /// Counts applied and keys removed
    Cleared { applied: AppliedWindow, keys: u64 },
}

/// Result of syncing one window
#[derive(Debug)]
pub struct WindowSync {
    pub window: ViewWindow,
    pub result: Result<WindowOutcome, SyncError>,
}

impl WindowSync {
    /// Where the window was left
    pub fn state(&self) -> WindowState {
        match &self.result {
            Ok(_) => WindowState::Cleared,
            Err(SyncError::DurableApply { .. } | SyncError::Clear { .. }) => WindowState::Drained,
            Err(_) => WindowState::Closed,
        }
    }
}

/// Result of one coordinator cycle, newest window first
#[derive(Debug, Default)]
pub struct SyncReport {
    pub windows: Vec<WindowSync>,
}

impl SyncReport {
    pub fn views_applied(&self) -> i64 {
        self.windows
            .iter()
            .filter_map(|w| match &w.result {
                Ok(WindowOutcome::Cleared { applied, .. }) => Some(applied.views),
                _ => None,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.windows.iter().filter(|w| w.result.is_err()).count()
    }
}

/// Moves closed windows from the cache into durable view totals
pub struct ViewCountSyncCoordinator {
    counter: WindowedViewCounter,
    locks: LockService,
    totals: Arc<dyn ViewTotalRepository>,
    config: SyncConfig,
}

impl ViewCountSyncCoordinator {
    pub fn new(
        counter: WindowedViewCounter,
        locks: LockService,
        totals: Arc<dyn ViewTotalRepository>,
        config: SyncConfig,
    ) -> Self {
        Self {
            counter,
            locks,
            totals,
            config,
        }
    }

    /// One cycle against the wall clock
    pub async fn run_once(&self) -> SyncReport {
        self.run_at(Utc::now()).await
    }

    /// One cycle as of `now`: the just-closed window, then the lookback windows
    pub async fn run_at(&self, now: DateTime<Utc>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut window = ViewWindow::last_closed(now);

        for _ in 0..=self.config.lookback_windows {
            let result = self.sync_window(window).await;
            match &result {
                Ok(WindowOutcome::Empty) => {
                    tracing::trace!(window = window.id(), "No view counts to sync");
                }
                Ok(WindowOutcome::Cleared { applied, keys }) => {
                    tracing::debug!(
                        window = window.id(),
                        contents = applied.inserted,
                        already_applied = applied.skipped,
                        views = applied.views,
                        keys,
                        "View count window synced"
                    );
                }
                Err(e @ SyncError::LockUnavailable { .. }) => {
                    tracing::warn!(window = window.id(), "{}, skipping", e);
                }
                Err(e @ SyncError::DurableApply { source, .. }) => {
                    tracing::warn!(
                        window = window.id(),
                        backend = source.backend(),
                        transient = source.is_transient(),
                        error = %e,
                        "View count apply failed, counts kept in cache"
                    );
                }
                Err(e) => {
                    tracing::warn!(window = window.id(), error = %e, "View count sync failed");
                }
            }
            report.windows.push(WindowSync { window, result });
            window = window.previous();
        }

        report
    }

    /// Drain, apply and clear one window under its lock
    pub async fn sync_window(&self, window: ViewWindow) -> Result<WindowOutcome, SyncError> {
        let lock = self.config.lock;
        self.locks
            .with_lock(&window.lock_scope(), lock.wait, lock.lease, || {
                self.drain_apply_clear(window)
            })
            .await?
            .unwrap_or(Err(SyncError::LockUnavailable { window }))
    }

    async fn drain_apply_clear(&self, window: ViewWindow) -> Result<WindowOutcome, SyncError> {
        let drained = self.counter.drain(window).await?;
        if drained.is_empty() {
            return Ok(WindowOutcome::Empty);
        }
        tracing::debug!(
            %window,
            contents = drained.counts.len(),
            views = drained.total_views(),
            "Drained view window"
        );

        let applied = if drained.counts.is_empty() {
            AppliedWindow::default()
        } else {
            self.totals
                .apply_increments(window.id(), &drained.counts)
                .await
                .map_err(|source| SyncError::DurableApply { window, source })?
        };

        let keys = self
            .counter
            .clear(&drained)
            .await
            .map_err(|source| SyncError::Clear { window, source })?;

        Ok(WindowOutcome::Cleared { applied, keys })
    }

    /// Run a cycle shortly after every minute boundary until shutdown
    ///
    /// A final cycle runs on shutdown so the last closed window is flushed.
    pub fn start(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let into_window = Utc::now().timestamp().rem_euclid(VIEW_WINDOW_SECS) as u64;
            let first = Duration::from_secs(VIEW_WINDOW_SECS as u64 - into_window + SYNC_GRACE_SECS);
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + first, self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("View count sync received shutdown, flushing last window");
                            self.run_once().await;
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let report = self.run_once().await;
                        if report.failures() > 0 {
                            tracing::warn!(
                                failures = report.failures(),
                                views = report.views_applied(),
                                "View count sync cycle finished with failures"
                            );
                        }
                    }
                }
            }
            tracing::debug!("View count sync shutdown complete");
        })
    }
}
