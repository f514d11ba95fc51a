//! One-minute view count windows
//!
//! A window is identified by `unix_seconds / 60`. Increments always target
//! the window containing "now"; only windows strictly in the past are ever
//! drained.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::core::constants::VIEW_WINDOW_SECS;
use crate::data::cache::CacheKey;

/// A fixed one-minute slice of wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewWindow(i64);

impl ViewWindow {
    /// Window containing `at`
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self(at.timestamp().div_euclid(VIEW_WINDOW_SECS))
    }

    /// Most recent window that is already closed at `now`
    pub fn last_closed(now: DateTime<Utc>) -> Self {
        Self::containing(now).previous()
    }

    pub fn id(&self) -> i64 {
        self.0
    }

    pub fn previous(&self) -> Self {
        Self(self.0 - 1)
    }

    /// Prefix shared by every counter of this window
    pub fn counter_prefix(&self) -> String {
        CacheKey::view_window_prefix(self.0)
    }

    /// Lock scope guarding the drain of this window
    pub fn lock_scope(&self) -> String {
        CacheKey::sync_lock(self.0)
    }
}

impl fmt::Display for ViewWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter address: a content within a window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub window: ViewWindow,
    pub content_id: String,
}

impl WindowKey {
    pub fn new(window: ViewWindow, content_id: impl Into<String>) -> Self {
        Self {
            window,
            content_id: content_id.into(),
        }
    }

    pub fn cache_key(&self) -> String {
        CacheKey::view_counter(self.window.id(), &self.content_id)
    }

    /// Parse a counter key belonging to `window`
    pub fn parse(window: ViewWindow, key: &str) -> Option<Self> {
        CacheKey::content_id_from_counter(window.id(), key).map(|id| Self::new(window, id))
    }
}

/// Lifecycle of a past window as seen by the sync coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Past, counts still only in the cache
    Closed,
    /// Counts read (and possibly applied) but keys still present
    Drained,
    /// Counts durably applied and keys removed
    Cleared,
}
