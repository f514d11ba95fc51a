//! Type-safe cache key builder

use crate::core::constants::{SYNC_LOCK_KEY_PREFIX, VIEW_COUNTER_KEY_PREFIX};

/// Type-safe cache key builder
///
/// Window ids are numeric and content ids must not contain `:`; the sync
/// coordinator parses the content id back out of the key suffix.
pub struct CacheKey;

impl CacheKey {
    // =========================================================================
    // View Counters
    // =========================================================================

    /// Counter for one content inside one view window
    pub fn view_counter(window_id: i64, content_id: &str) -> String {
        format!("{}:{}:{}", VIEW_COUNTER_KEY_PREFIX, window_id, content_id)
    }

    /// Prefix shared by every counter of a window (trailing `:` included)
    pub fn view_window_prefix(window_id: i64) -> String {
        format!("{}:{}:", VIEW_COUNTER_KEY_PREFIX, window_id)
    }

    /// Extract the content id from a counter key of the given window
    pub fn content_id_from_counter(window_id: i64, key: &str) -> Option<&str> {
        let prefix = Self::view_window_prefix(window_id);
        key.strip_prefix(prefix.as_str())
            .filter(|content_id| !content_id.is_empty())
    }

    // =========================================================================
    // Locks
    // =========================================================================

    /// Lock scope guarding the drain-apply-clear sequence of one window
    pub fn sync_lock(window_id: i64) -> String {
        format!("{}:{}", SYNC_LOCK_KEY_PREFIX, window_id)
    }
}
