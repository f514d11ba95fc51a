//! Daily aggregation and settlement batch
//!
//! Loads one day's watch records, validates them, and for every content
//! with at least one eligible record: aggregates period statistics,
//! persists them, then settles against the previous settlement. Contents
//! are processed concurrently and independently; one content failing does
//! not stop the others.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::settlement::{CachedRateSource, RateResolver, SettlementCalculator, SettlementError};
use super::statistics::{ValidationReport, aggregate, period_to_date_start, validate_all};
use crate::core::config::SettlementConfig;
use crate::data::SqliteService;
use crate::data::error::DataError;
use crate::data::traits::{
    RateRepository, SettlementRepository, StatisticsRepository, ViewTotalRepository,
    WatchRecordRepository,
};
use crate::data::types::{PeriodKind, SettlementResult};
use crate::utils::time::start_of_day_utc;

/// Stores the pipeline reads from and writes to
#[derive(Clone)]
pub struct PipelineStores {
    pub watch_records: Arc<dyn WatchRecordRepository>,
    pub statistics: Arc<dyn StatisticsRepository>,
    pub settlements: Arc<dyn SettlementRepository>,
    pub view_totals: Arc<dyn ViewTotalRepository>,
    pub rates: Arc<dyn RateRepository>,
}

impl PipelineStores {
    /// Every store backed by the same SQLite database
    pub fn sqlite(db: &Arc<SqliteService>) -> Self {
        Self {
            watch_records: Arc::new(Arc::clone(db)),
            statistics: Arc::new(Arc::clone(db)),
            settlements: Arc::new(Arc::clone(db)),
            view_totals: Arc::new(Arc::clone(db)),
            rates: Arc::new(Arc::clone(db)),
        }
    }
}

/// A content whose statistics or settlement failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFailure {
    pub content_id: String,
    pub error: String,
}

/// Outcome of one daily run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub date: NaiveDate,
    pub run_id: String,
    /// Settled contents, sorted
    pub succeeded: Vec<String>,
    /// Failed contents, sorted by id
    pub failed: Vec<ContentFailure>,
    pub validation: ValidationReport,
    pub incremental_content_revenue: i64,
    pub incremental_ad_revenue: i64,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct DailyPipeline {
    stores: PipelineStores,
    calculator: SettlementCalculator,
    concurrency: usize,
}

impl DailyPipeline {
    /// Rate reads go through a short-lived in-process cache
    pub fn new(stores: PipelineStores, config: &SettlementConfig) -> Self {
        let rates: Arc<dyn RateRepository> = Arc::new(CachedRateSource::new(
            Arc::clone(&stores.rates),
            config.rate_cache_ttl,
        ));
        Self {
            stores,
            calculator: SettlementCalculator::new(RateResolver::new(rates)),
            concurrency: config.concurrency.max(1),
        }
    }

    /// Aggregate and settle every content watched on `date`
    ///
    /// Fails only when the day's records cannot be loaded; per-content
    /// failures are reported in the summary.
    pub async fn run(&self, date: NaiveDate) -> Result<BatchSummary, DataError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        let raws = self.stores.watch_records.list_watch_records_for_date(date).await?;
        let (records, validation) = validate_all(raws);
        if validation.skipped_total() > 0 {
            tracing::warn!(
                %date,
                skipped = validation.skipped_total(),
                accepted = validation.accepted,
                "Skipped ineligible watch records"
            );
        }

        let content_ids: BTreeSet<String> = records.into_iter().map(|r| r.content_id).collect();
        tracing::debug!(%date, run_id = %run_id, contents = content_ids.len(), "Starting daily run");

        let run_ref = run_id.as_str();
        let outcomes: Vec<(String, Result<Option<SettlementResult>, SettlementError>)> =
            futures::stream::iter(content_ids)
                .map(move |content_id| async move {
                    let outcome = self.process_content(run_ref, &content_id, date).await;
                    (content_id, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut summary = BatchSummary {
            date,
            run_id,
            succeeded: Vec::new(),
            failed: Vec::new(),
            validation,
            incremental_content_revenue: 0,
            incremental_ad_revenue: 0,
        };
        for (content_id, outcome) in outcomes {
            match outcome {
                Ok(Some(result)) => {
                    summary.incremental_content_revenue = summary
                        .incremental_content_revenue
                        .saturating_add(result.incremental_content_revenue);
                    summary.incremental_ad_revenue = summary
                        .incremental_ad_revenue
                        .saturating_add(result.incremental_ad_revenue);
                    summary.succeeded.push(content_id);
                }
                Ok(None) => {
                    tracing::debug!(content_id = %content_id, "No eligible records on date, nothing settled");
                }
                Err(e) => {
                    tracing::warn!(content_id = %content_id, %date, error = %e, "Content settlement failed");
                    summary.failed.push(ContentFailure {
                        content_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        summary.succeeded.sort();
        summary.failed.sort_by(|a, b| a.content_id.cmp(&b.content_id));

        tracing::info!(
            %date,
            run_id = %summary.run_id,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            content_revenue = summary.incremental_content_revenue,
            ad_revenue = summary.incremental_ad_revenue,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Daily settlement run finished"
        );
        Ok(summary)
    }

    /// Statistics then settlement for one content
    async fn process_content(
        &self,
        run_id: &str,
        content_id: &str,
        date: NaiveDate,
    ) -> Result<Option<SettlementResult>, SettlementError> {
        let raws = self
            .stores
            .watch_records
            .list_watch_records_for_content(content_id, period_to_date_start(date), date)
            .await?;
        let (records, _) = validate_all(raws);
        let accumulated_views = self
            .stores
            .view_totals
            .accumulated_views(content_id, date)
            .await?;

        let statistics = aggregate(content_id, date, &records, accumulated_views)?;
        let Some(daily) = statistics.iter().find(|s| s.period == PeriodKind::Daily) else {
            return Ok(None);
        };
        self.stores
            .statistics
            .insert_statistics(run_id, &statistics)
            .await?;

        let ad_view_count = self
            .stores
            .watch_records
            .ad_views_through(content_id, date)
            .await?;
        let previous = self
            .stores
            .settlements
            .previous_snapshot(content_id, date)
            .await?;

        let result = self
            .calculator
            .calculate(content_id, daily, ad_view_count, &previous)
            .await?;
        self.stores
            .settlements
            .insert_settlement(run_id, &result)
            .await?;

        tracing::debug!(
            content_id,
            accumulated_views,
            incremental_content = result.incremental_content_revenue,
            incremental_ad = result.incremental_ad_revenue,
            "Content settled"
        );
        Ok(Some(result))
    }

    /// Run for the previous day at `run_hour` UTC every day until shutdown
    pub fn start(self: Arc<Self>, run_hour: u32, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(fire_at) = next_run_at(now, run_hour) else {
                    tracing::error!(run_hour, "Cannot compute next daily run time");
                    break;
                };
                let wait = (fire_at - now).to_std().unwrap_or_default();
                tracing::debug!(fire_at = %fire_at, "Next daily settlement run scheduled");

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(wait) => {
                        let Some(target) = fire_at.date_naive().checked_sub_days(Days::new(1)) else {
                            continue;
                        };
                        if let Err(e) = self.run(target).await {
                            tracing::error!(date = %target, error = %e, "Daily settlement run failed");
                        }
                    }
                }
            }
            tracing::debug!("Daily settlement task shutdown complete");
        })
    }
}

/// Next `run_hour:00` UTC strictly after `now`
fn next_run_at(now: DateTime<Utc>, run_hour: u32) -> Option<DateTime<Utc>> {
    let today = start_of_day_utc(now.date_naive()) + chrono::Duration::hours(i64::from(run_hour));
    if today > now {
        Some(today)
    } else {
        today.checked_add_days(Days::new(1))
    }
}
