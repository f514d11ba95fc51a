// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ViewLedger";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "viewledger";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".viewledger";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "viewledger.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "VIEWLEDGER_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "VIEWLEDGER_LOG";

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "VIEWLEDGER_DATA_DIR";

// =============================================================================
// Environment Variables - Cache
// =============================================================================

/// Environment variable for cache backend (memory or redis)
pub const ENV_CACHE_BACKEND: &str = "VIEWLEDGER_CACHE_BACKEND";

/// Environment variable for Redis-compatible cache URL
pub const ENV_CACHE_REDIS_URL: &str = "VIEWLEDGER_CACHE_REDIS_URL";

// =============================================================================
// Environment Variables - View Count Sync
// =============================================================================

/// Environment variable to enable/disable the per-minute view count sync
pub const ENV_SYNC_ENABLED: &str = "VIEWLEDGER_SYNC_ENABLED";

/// Environment variable for the sync interval in seconds
pub const ENV_SYNC_INTERVAL_SECS: &str = "VIEWLEDGER_SYNC_INTERVAL_SECS";

/// Environment variable for the number of earlier windows retried per cycle
pub const ENV_SYNC_LOOKBACK_WINDOWS: &str = "VIEWLEDGER_SYNC_LOOKBACK_WINDOWS";

/// Environment variable for the lock wait timeout in milliseconds
pub const ENV_SYNC_LOCK_WAIT_MS: &str = "VIEWLEDGER_SYNC_LOCK_WAIT_MS";

/// Environment variable for the lock lease in milliseconds
pub const ENV_SYNC_LOCK_LEASE_MS: &str = "VIEWLEDGER_SYNC_LOCK_LEASE_MS";

// =============================================================================
// Environment Variables - Settlement
// =============================================================================

/// Environment variable to enable/disable the daily settlement pipeline
pub const ENV_SETTLEMENT_ENABLED: &str = "VIEWLEDGER_SETTLEMENT_ENABLED";

/// Environment variable for the UTC hour at which the daily pipeline fires
pub const ENV_SETTLEMENT_RUN_HOUR: &str = "VIEWLEDGER_SETTLEMENT_RUN_HOUR";

/// Environment variable for the number of contents settled concurrently
pub const ENV_SETTLEMENT_CONCURRENCY: &str = "VIEWLEDGER_SETTLEMENT_CONCURRENCY";

// =============================================================================
// View Count Windows
// =============================================================================

/// Length of a view count window in seconds
pub const VIEW_WINDOW_SECS: i64 = 60;

/// Default interval between sync cycles in seconds
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default TTL for window counters (keeps missed windows addressable)
pub const DEFAULT_VIEW_COUNTER_TTL_SECS: u64 = 600;

/// Default number of earlier windows retried on each sync cycle
pub const DEFAULT_SYNC_LOOKBACK_WINDOWS: u32 = 1;

/// Default wait for acquiring the per-window sync lock
pub const DEFAULT_SYNC_LOCK_WAIT_MS: u64 = 3_000;

/// Default lease for the per-window sync lock (auto-expires on crash)
pub const DEFAULT_SYNC_LOCK_LEASE_MS: u64 = 30_000;

/// Poll interval while waiting for a contended lock
pub const LOCK_RETRY_INTERVAL_MS: u64 = 50;

// =============================================================================
// Settlement
// =============================================================================

/// Default UTC hour for the daily aggregation + settlement run
pub const DEFAULT_SETTLEMENT_RUN_HOUR: u32 = 1;

/// Default number of contents processed concurrently in the daily batch
pub const DEFAULT_SETTLEMENT_CONCURRENCY: usize = 8;

/// Default TTL of the in-process rate table cache
pub const DEFAULT_RATE_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// Cache Keys
// =============================================================================

/// Prefix for windowed view counters (`vc:{window}:{content}`)
pub const VIEW_COUNTER_KEY_PREFIX: &str = "vc";

/// Prefix for sync locks (`lock:vc-sync:{window}`)
pub const SYNC_LOCK_KEY_PREFIX: &str = "lock:vc-sync";

// =============================================================================
// SQLite
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "viewledger.db";

/// SQLite maximum pool connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 8;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

/// SQLite WAL auto-checkpoint threshold in pages
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// Interval between explicit WAL checkpoints in seconds
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
