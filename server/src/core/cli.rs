use clap::{Parser, Subcommand};

use std::path::PathBuf;

use chrono::NaiveDate;

use super::config::CacheBackendType;
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_REDIS_URL, ENV_CONFIG, ENV_SETTLEMENT_CONCURRENCY,
    ENV_SETTLEMENT_ENABLED, ENV_SETTLEMENT_RUN_HOUR, ENV_SYNC_ENABLED, ENV_SYNC_INTERVAL_SECS,
    ENV_SYNC_LOCK_LEASE_MS, ENV_SYNC_LOCK_WAIT_MS, ENV_SYNC_LOOKBACK_WINDOWS,
};

#[derive(Parser)]
#[command(name = "viewledger")]
#[command(version, about = "View count aggregation and creator settlement", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    // Cache options
    /// Cache backend (memory or redis)
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Redis-compatible cache URL (Redis, Valkey, Dragonfly).
    /// Formats: redis://host:port/db, rediss://host:port/db
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    // Sync options
    /// Enable or disable the per-minute view count sync
    #[arg(long, global = true, env = ENV_SYNC_ENABLED)]
    pub sync_enabled: Option<bool>,

    /// Seconds between view count sync cycles
    #[arg(long, global = true, env = ENV_SYNC_INTERVAL_SECS)]
    pub sync_interval_secs: Option<u64>,

    /// Earlier windows retried on every sync cycle
    #[arg(long, global = true, env = ENV_SYNC_LOOKBACK_WINDOWS)]
    pub sync_lookback_windows: Option<u32>,

    /// Milliseconds to wait for the per-window sync lock
    #[arg(long, global = true, env = ENV_SYNC_LOCK_WAIT_MS)]
    pub sync_lock_wait_ms: Option<u64>,

    /// Lease of the per-window sync lock in milliseconds
    #[arg(long, global = true, env = ENV_SYNC_LOCK_LEASE_MS)]
    pub sync_lock_lease_ms: Option<u64>,

    // Settlement options
    /// Enable or disable the daily aggregation + settlement pipeline
    #[arg(long, global = true, env = ENV_SETTLEMENT_ENABLED)]
    pub settlement_enabled: Option<bool>,

    /// UTC hour (0-23) at which the daily pipeline runs for the previous day
    #[arg(long, global = true, env = ENV_SETTLEMENT_RUN_HOUR)]
    pub settlement_run_hour: Option<u32>,

    /// Contents settled concurrently in the daily batch
    #[arg(long, global = true, env = ENV_SETTLEMENT_CONCURRENCY)]
    pub settlement_concurrency: Option<usize>,
}

/// Parse cache backend type from CLI/env string
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis",
            s
        )),
    }
}

/// Parse a calendar date (YYYY-MM-DD)
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}' (expected YYYY-MM-DD): {}", s, e))
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the sync and settlement workers (default command)
    Start,
    /// Run a single job and exit
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Settlement rate table commands
    Rates {
        #[command(subcommand)]
        command: RateCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum RunCommands {
    /// Aggregate statistics and settle revenue for one day
    Daily {
        /// Target date (defaults to yesterday, UTC)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Flush the previous view count window to durable storage
    Sync,
}

#[derive(Subcommand, Clone, Debug)]
pub enum RateCommands {
    /// Report rates whose view ranges and validity windows overlap
    Check,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_redis_url: Option<String>,
    pub sync_enabled: Option<bool>,
    pub sync_interval_secs: Option<u64>,
    pub sync_lookback_windows: Option<u32>,
    pub sync_lock_wait_ms: Option<u64>,
    pub sync_lock_lease_ms: Option<u64>,
    pub settlement_enabled: Option<bool>,
    pub settlement_run_hour: Option<u32>,
    pub settlement_concurrency: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        cache_backend: cli.cache_backend,
        cache_redis_url: cli.cache_redis_url,
        sync_enabled: cli.sync_enabled,
        sync_interval_secs: cli.sync_interval_secs,
        sync_lookback_windows: cli.sync_lookback_windows,
        sync_lock_wait_ms: cli.sync_lock_wait_ms,
        sync_lock_lease_ms: cli.sync_lock_lease_ms,
        settlement_enabled: cli.settlement_enabled,
        settlement_run_hour: cli.settlement_run_hour,
        settlement_concurrency: cli.settlement_concurrency,
    };
    (config, cli.command)
}
