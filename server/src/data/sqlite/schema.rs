//! SQLite schema definitions
//!
//! Dates are `YYYY-MM-DD` text, instants are Unix seconds. Statistics and
//! settlements are append-only: a later run for the same key adds a row and
//! readers take the highest id.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Catalog: members and contents
-- =============================================================================
CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    display_name TEXT CHECK(display_name IS NULL OR length(display_name) <= 100),
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS contents (
    id TEXT PRIMARY KEY CHECK(length(id) >= 1 AND instr(id, ':') = 0),
    creator_id TEXT NOT NULL REFERENCES members(id),
    title TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contents_creator ON contents(creator_id);

-- =============================================================================
-- 2. Watch records (per member, content and day)
-- =============================================================================
-- No foreign keys: unresolvable references are rejected at validation time
CREATE TABLE IF NOT EXISTS watch_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    member_id TEXT NOT NULL,
    content_id TEXT NOT NULL,
    watched_date TEXT NOT NULL,
    last_viewed_position INTEGER NOT NULL DEFAULT 0,
    last_ad_view_count INTEGER NOT NULL DEFAULT 0,
    completion_status TEXT NOT NULL CHECK(completion_status IN ('IN_PROGRESS', 'PAUSED', 'COMPLETED')),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_watch_records_date ON watch_records(watched_date, content_id);
CREATE INDEX IF NOT EXISTS idx_watch_records_content ON watch_records(content_id, watched_date);

-- =============================================================================
-- 3. Settlement rate tiers
-- =============================================================================
CREATE TABLE IF NOT EXISTS settlement_rates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    settlement_type TEXT NOT NULL CHECK(settlement_type IN ('CONTENT', 'ADVERTISEMENT')),
    min_views INTEGER NOT NULL CHECK(min_views >= 0),
    max_views INTEGER CHECK(max_views IS NULL OR max_views >= min_views),
    applied_at INTEGER,
    expired_at INTEGER,
    rate_value INTEGER NOT NULL CHECK(rate_value >= 0),
    created_at INTEGER NOT NULL,
    CHECK(applied_at IS NULL OR expired_at IS NULL OR expired_at >= applied_at)
);

CREATE INDEX IF NOT EXISTS idx_settlement_rates_type ON settlement_rates(settlement_type, min_views);

-- =============================================================================
-- 4. Durable view totals and the per-window ledger
-- =============================================================================
CREATE TABLE IF NOT EXISTS content_view_totals (
    content_id TEXT PRIMARY KEY,
    total_views INTEGER NOT NULL DEFAULT 0 CHECK(total_views >= 0),
    updated_at INTEGER NOT NULL
);

-- One row per applied (content, window) so reapplying a window is a no-op
CREATE TABLE IF NOT EXISTS view_count_ledger (
    content_id TEXT NOT NULL,
    window_id INTEGER NOT NULL,
    view_count INTEGER NOT NULL CHECK(view_count > 0),
    applied_at INTEGER NOT NULL,
    PRIMARY KEY (content_id, window_id)
);

CREATE INDEX IF NOT EXISTS idx_view_count_ledger_window ON view_count_ledger(window_id);

-- =============================================================================
-- 5. Period statistics (append-only)
-- =============================================================================
CREATE TABLE IF NOT EXISTS period_statistics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    content_id TEXT NOT NULL,
    period TEXT NOT NULL CHECK(period IN ('DAILY', 'WEEKLY', 'MONTHLY', 'YEARLY')),
    bucket_date TEXT NOT NULL,
    view_count INTEGER NOT NULL CHECK(view_count >= 0),
    watch_time_seconds INTEGER NOT NULL CHECK(watch_time_seconds >= 0),
    ad_view_count INTEGER NOT NULL CHECK(ad_view_count >= 0),
    accumulated_views INTEGER NOT NULL CHECK(accumulated_views >= 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_period_statistics_bucket ON period_statistics(content_id, period, bucket_date, id);
CREATE INDEX IF NOT EXISTS idx_period_statistics_run ON period_statistics(run_id);

-- =============================================================================
-- 6. Settlements (append-only)
-- =============================================================================
CREATE TABLE IF NOT EXISTS settlements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    content_id TEXT NOT NULL,
    settlement_date TEXT NOT NULL,
    accumulated_views INTEGER NOT NULL,
    ad_view_count INTEGER NOT NULL,
    content_rate_id INTEGER NOT NULL,
    ad_rate_id INTEGER,
    period_total_content_revenue INTEGER NOT NULL,
    period_total_ad_revenue INTEGER NOT NULL,
    previous_content_revenue INTEGER NOT NULL,
    previous_ad_revenue INTEGER NOT NULL,
    incremental_content_revenue INTEGER NOT NULL CHECK(incremental_content_revenue >= 0),
    incremental_ad_revenue INTEGER NOT NULL CHECK(incremental_ad_revenue >= 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_settlements_content_date ON settlements(content_id, settlement_date, id);
CREATE INDEX IF NOT EXISTS idx_settlements_run ON settlements(run_id)
"#;
