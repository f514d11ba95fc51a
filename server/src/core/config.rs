use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_RATE_CACHE_TTL_SECS, DEFAULT_SETTLEMENT_CONCURRENCY,
    DEFAULT_SETTLEMENT_RUN_HOUR, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_LOCK_LEASE_MS,
    DEFAULT_SYNC_LOCK_WAIT_MS, DEFAULT_SYNC_LOOKBACK_WINDOWS, DEFAULT_VIEW_COUNTER_TTL_SECS,
};

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Cache backend type (also backs the distributed lock)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// File Config (JSON)
// =============================================================================

/// Redis cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    /// Connection URL for Redis-compatible backends
    pub url: Option<String>,
}

/// Cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CacheFileConfig {
    pub backend: Option<CacheBackendType>,
    pub redis: Option<RedisFileConfig>,
    /// TTL applied to window counters on first increment
    pub counter_ttl_secs: Option<u64>,
}

/// Sync lock configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LockFileConfig {
    pub wait_ms: Option<u64>,
    pub lease_ms: Option<u64>,
}

/// View count sync configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SyncFileConfig {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
    pub lookback_windows: Option<u32>,
    pub lock: Option<LockFileConfig>,
}

/// Settlement configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SettlementFileConfig {
    pub enabled: Option<bool>,
    pub run_hour: Option<u32>,
    pub concurrency: Option<usize>,
    pub rate_cache_ttl_secs: Option<u64>,
}

/// Root of the JSON config file
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub cache: Option<CacheFileConfig>,
    pub sync: Option<SyncFileConfig>,
    pub settlement: Option<SettlementFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Cache
        if let Some(cache) = other.cache {
            let current = self.cache.get_or_insert_with(CacheFileConfig::default);
            if cache.backend.is_some() {
                tracing::trace!(backend = ?cache.backend, "Merging cache.backend");
                current.backend = cache.backend;
            }
            if let Some(redis) = cache.redis
                && redis.url.is_some()
            {
                tracing::trace!("Merging cache.redis.url");
                current
                    .redis
                    .get_or_insert_with(RedisFileConfig::default)
                    .url = redis.url;
            }
            if cache.counter_ttl_secs.is_some() {
                current.counter_ttl_secs = cache.counter_ttl_secs;
            }
        }

        // Sync (with nested lock)
        if let Some(sync) = other.sync {
            let current = self.sync.get_or_insert_with(SyncFileConfig::default);
            if sync.enabled.is_some() {
                tracing::trace!(enabled = ?sync.enabled, "Merging sync.enabled");
                current.enabled = sync.enabled;
            }
            if sync.interval_secs.is_some() {
                current.interval_secs = sync.interval_secs;
            }
            if sync.lookback_windows.is_some() {
                current.lookback_windows = sync.lookback_windows;
            }
            if let Some(lock) = sync.lock {
                let current_lock = current.lock.get_or_insert_with(LockFileConfig::default);
                if lock.wait_ms.is_some() {
                    current_lock.wait_ms = lock.wait_ms;
                }
                if lock.lease_ms.is_some() {
                    current_lock.lease_ms = lock.lease_ms;
                }
            }
        }

        // Settlement
        if let Some(settlement) = other.settlement {
            let current = self
                .settlement
                .get_or_insert_with(SettlementFileConfig::default);
            if settlement.enabled.is_some() {
                tracing::trace!(enabled = ?settlement.enabled, "Merging settlement.enabled");
                current.enabled = settlement.enabled;
            }
            if settlement.run_hour.is_some() {
                current.run_hour = settlement.run_hour;
            }
            if settlement.concurrency.is_some() {
                current.concurrency = settlement.concurrency;
            }
            if settlement.rate_cache_ttl_secs.is_some() {
                current.rate_cache_ttl_secs = settlement.rate_cache_ttl_secs;
            }
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

/// Cache configuration (used internally by CacheService and the lock manager)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackendType,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
    /// TTL applied to window counters
    pub counter_ttl: Duration,
}

/// Per-window sync lock timing
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// Bounded wait to acquire
    pub wait: Duration,
    /// Lease after which a held lock auto-expires
    pub lease: Duration,
}

/// View count sync configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Earlier windows retried on every cycle
    pub lookback_windows: u32,
    pub lock: LockConfig,
}

/// Daily aggregation + settlement configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub enabled: bool,
    /// UTC hour at which the pipeline runs for the previous day
    pub run_hour: u32,
    /// Contents processed concurrently
    pub concurrency: usize,
    pub rate_cache_ttl: Duration,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub settlement: SettlementConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.viewledger/viewledger.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::resolve(cli, file_config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_cache = file_config.cache.unwrap_or_default();
        let file_sync = file_config.sync.unwrap_or_default();
        let file_lock = file_sync.lock.clone().unwrap_or_default();
        let file_settlement = file_config.settlement.unwrap_or_default();

        let backend = cli
            .cache_backend
            .or(file_cache.backend)
            .unwrap_or_default();
        let redis_url = cli
            .cache_redis_url
            .clone()
            .or(file_cache.redis.and_then(|r| r.url));
        if backend == CacheBackendType::Redis && redis_url.is_none() {
            anyhow::bail!("cache.redis.url is required when cache backend is redis");
        }

        let cache = CacheConfig {
            backend,
            redis_url,
            counter_ttl: Duration::from_secs(
                file_cache
                    .counter_ttl_secs
                    .unwrap_or(DEFAULT_VIEW_COUNTER_TTL_SECS),
            ),
        };

        let interval_secs = cli
            .sync_interval_secs
            .or(file_sync.interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        if interval_secs == 0 {
            anyhow::bail!("sync.interval_secs must be greater than zero");
        }

        let sync = SyncConfig {
            enabled: cli.sync_enabled.or(file_sync.enabled).unwrap_or(true),
            interval: Duration::from_secs(interval_secs),
            lookback_windows: cli
                .sync_lookback_windows
                .or(file_sync.lookback_windows)
                .unwrap_or(DEFAULT_SYNC_LOOKBACK_WINDOWS),
            lock: LockConfig {
                wait: Duration::from_millis(
                    cli.sync_lock_wait_ms
                        .or(file_lock.wait_ms)
                        .unwrap_or(DEFAULT_SYNC_LOCK_WAIT_MS),
                ),
                lease: Duration::from_millis(
                    cli.sync_lock_lease_ms
                        .or(file_lock.lease_ms)
                        .unwrap_or(DEFAULT_SYNC_LOCK_LEASE_MS),
                ),
            },
        };

        // A counter that expires before the lookback reaches it is lost silently
        let reachable = sync.interval * (sync.lookback_windows + 1);
        if cache.counter_ttl < reachable {
            tracing::warn!(
                counter_ttl_secs = cache.counter_ttl.as_secs(),
                lookback_windows = sync.lookback_windows,
                "Counter TTL is shorter than the sync lookback; missed windows will expire first"
            );
        }

        let run_hour = cli
            .settlement_run_hour
            .or(file_settlement.run_hour)
            .unwrap_or(DEFAULT_SETTLEMENT_RUN_HOUR);
        if run_hour > 23 {
            anyhow::bail!("settlement.run_hour must be between 0 and 23, got {}", run_hour);
        }

        let settlement = SettlementConfig {
            enabled: cli
                .settlement_enabled
                .or(file_settlement.enabled)
                .unwrap_or(true),
            run_hour,
            concurrency: cli
                .settlement_concurrency
                .or(file_settlement.concurrency)
                .unwrap_or(DEFAULT_SETTLEMENT_CONCURRENCY)
                .max(1),
            rate_cache_ttl: Duration::from_secs(
                file_settlement
                    .rate_cache_ttl_secs
                    .unwrap_or(DEFAULT_RATE_CACHE_TTL_SECS),
            ),
        };

        let config = Self {
            cache,
            sync,
            settlement,
        };
        tracing::debug!(config = ?config, "Configuration resolved");
        Ok(config)
    }
}

/// Profile config path (~/.viewledger/viewledger.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
