//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};

use crate::core::cli::{self, CliConfig, Commands, RateCommands, RunCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::data::cache::CacheService;
use crate::data::locks::LockService;
use crate::domain::settlement::check_rate_overlaps;
use crate::domain::{DailyPipeline, PipelineStores, ViewCountSyncCoordinator, WindowedViewCounter};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub cache: Arc<CacheService>,
    pub locks: LockService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;
        match command {
            Some(Commands::Run {
                command: RunCommands::Daily { date },
            }) => app.finish(app.run_daily(date).await).await,
            Some(Commands::Run {
                command: RunCommands::Sync,
            }) => app.finish(app.run_sync().await).await,
            Some(Commands::Rates {
                command: RateCommands::Check,
            }) => app.finish(app.check_rates().await).await,
            Some(Commands::Start) | None => app.start().await,
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init().await?;

        let database = Arc::new(
            SqliteService::init(&storage)
                .await
                .context("Failed to initialize SQLite")?,
        );

        let cache = Arc::new(
            CacheService::new(&config.cache)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let locks = LockService::for_cache(&cache);
        tracing::debug!(backend = locks.backend_name(), "Locks initialized");

        let shutdown = ShutdownService::new(Arc::clone(&database));

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            cache,
            locks,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    /// Close storage after a one-shot command, keeping its result
    async fn finish(&self, result: Result<()>) -> Result<()> {
        self.shutdown.shutdown().await;
        result
    }

    fn pipeline(&self) -> DailyPipeline {
        DailyPipeline::new(
            PipelineStores::sqlite(&self.database),
            &self.config.settlement,
        )
    }

    fn coordinator(&self) -> ViewCountSyncCoordinator {
        ViewCountSyncCoordinator::new(
            WindowedViewCounter::new(Arc::clone(&self.cache), self.config.cache.counter_ttl),
            self.locks.clone(),
            Arc::new(Arc::clone(&self.database)),
            self.config.sync.clone(),
        )
    }

    async fn run_daily(&self, date: Option<NaiveDate>) -> Result<()> {
        let date = match date {
            Some(date) => date,
            None => Utc::now()
                .date_naive()
                .checked_sub_days(Days::new(1))
                .context("Cannot compute yesterday's date")?,
        };

        let summary = self
            .pipeline()
            .run(date)
            .await
            .with_context(|| format!("Daily run for {} failed", date))?;
        println!("{}", serde_json::to_string_pretty(&summary)?);

        if !summary.is_success() {
            anyhow::bail!(
                "{} of {} contents failed settlement for {}",
                summary.failed.len(),
                summary.failed.len() + summary.succeeded.len(),
                date
            );
        }
        Ok(())
    }

    async fn run_sync(&self) -> Result<()> {
        let report = self.coordinator().run_once().await;
        tracing::info!(
            windows = report.windows.len(),
            views = report.views_applied(),
            failures = report.failures(),
            "View count sync finished"
        );
        if report.failures() > 0 {
            anyhow::bail!("{} view count windows failed to sync", report.failures());
        }
        Ok(())
    }

    async fn check_rates(&self) -> Result<()> {
        let overlaps = check_rate_overlaps(&self.database).await?;
        println!("{}", serde_json::to_string_pretty(&overlaps)?);
        if !overlaps.is_empty() {
            anyhow::bail!("{} overlapping rate pairs found", overlaps.len());
        }
        Ok(())
    }

    async fn warn_rate_overlaps(&self) {
        match check_rate_overlaps(&self.database).await {
            Ok(overlaps) => {
                for overlap in &overlaps {
                    tracing::warn!(
                        settlement_type = %overlap.settlement_type,
                        first = overlap.first_id,
                        second = overlap.second_id,
                        "Settlement rates overlap, resolution falls back to tie-break"
                    );
                }
            }
            Err(e) => tracing::warn!(error = %e, "Rate overlap check failed"),
        }
    }

    /// Run the background workers until Ctrl+C/SIGTERM
    async fn start(self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        self.shutdown.install_signal_handlers();

        self.warn_rate_overlaps().await;
        self.start_background_tasks().await;

        tracing::info!(
            data_dir = %self.storage.data_dir().display(),
            cache = self.cache.backend_name(),
            sync = self.config.sync.enabled,
            settlement = self.config.settlement.enabled,
            "ViewLedger started"
        );

        self.shutdown.wait().await;
        self.shutdown.shutdown().await;
        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        if self.config.sync.enabled {
            let coordinator = Arc::new(self.coordinator());
            self.shutdown
                .register(coordinator.start(self.shutdown.subscribe()))
                .await;
        } else {
            tracing::debug!("View count sync disabled by config");
        }

        if self.config.settlement.enabled {
            let pipeline = Arc::new(self.pipeline());
            self.shutdown
                .register(pipeline.start(self.config.settlement.run_hour, self.shutdown.subscribe()))
                .await;
        } else {
            tracing::debug!("Daily settlement disabled by config");
        }
    }
}
