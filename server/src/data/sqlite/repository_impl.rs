//! Repository trait implementations for SQLite
//!
//! Implements the per-aggregate traits for `Arc<SqliteService>` by
//! delegating to the free functions in `repositories`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::data::error::DataError;
use crate::data::traits::{
    RateRepository, SettlementRepository, StatisticsRepository, ViewTotalRepository,
    WatchRecordRepository,
};
use crate::data::types::{
    AppliedWindow, NewSettlementRate, NewWatchRecord, PeriodKind, PeriodStatistic,
    PeriodStatisticRow, PreviousSettlementSnapshot, RawWatchRecord, SettlementRate,
    SettlementResult, SettlementType,
};

use super::SqliteService;
use super::repositories::{rate, settlement, statistic, view_total, watch_record};

#[async_trait]
impl WatchRecordRepository for Arc<SqliteService> {
    async fn insert_watch_record(&self, record: &NewWatchRecord) -> Result<i64, DataError> {
        watch_record::insert_watch_record(self.pool(), record)
            .await
            .map_err(Into::into)
    }

    async fn list_watch_records_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<RawWatchRecord>, DataError> {
        watch_record::list_for_date(self.pool(), date)
            .await
            .map_err(Into::into)
    }

    async fn list_watch_records_for_content(
        &self,
        content_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawWatchRecord>, DataError> {
        watch_record::list_for_content(self.pool(), content_id, from, to)
            .await
            .map_err(Into::into)
    }

    async fn ad_views_through(
        &self,
        content_id: &str,
        through: NaiveDate,
    ) -> Result<i64, DataError> {
        watch_record::sum_ad_views_through(self.pool(), content_id, through)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl RateRepository for Arc<SqliteService> {
    async fn list_rates(
        &self,
        settlement_type: SettlementType,
    ) -> Result<Vec<SettlementRate>, DataError> {
        rate::list_rates(self.pool(), settlement_type)
            .await
            .map_err(Into::into)
    }

    async fn find_candidate_rates(
        &self,
        settlement_type: SettlementType,
        views: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SettlementRate>, DataError> {
        rate::find_candidate_rates(self.pool(), settlement_type, views, as_of)
            .await
            .map_err(Into::into)
    }

    async fn insert_rate(&self, new_rate: &NewSettlementRate) -> Result<i64, DataError> {
        rate::insert_rate(self.pool(), new_rate)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl StatisticsRepository for Arc<SqliteService> {
    async fn insert_statistics(
        &self,
        run_id: &str,
        statistics: &[PeriodStatistic],
    ) -> Result<Vec<i64>, DataError> {
        statistic::insert_statistics(self.pool(), run_id, statistics)
            .await
            .map_err(Into::into)
    }

    async fn latest_statistic(
        &self,
        content_id: &str,
        period: PeriodKind,
        bucket_date: NaiveDate,
    ) -> Result<Option<PeriodStatisticRow>, DataError> {
        statistic::latest_statistic(self.pool(), content_id, period, bucket_date)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl SettlementRepository for Arc<SqliteService> {
    async fn insert_settlement(
        &self,
        run_id: &str,
        result: &SettlementResult,
    ) -> Result<i64, DataError> {
        settlement::insert_settlement(self.pool(), run_id, result)
            .await
            .map_err(Into::into)
    }

    async fn previous_snapshot(
        &self,
        content_id: &str,
        before: NaiveDate,
    ) -> Result<PreviousSettlementSnapshot, DataError> {
        settlement::previous_snapshot(self.pool(), content_id, before)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl ViewTotalRepository for Arc<SqliteService> {
    async fn apply_increments(
        &self,
        window_id: i64,
        counts: &HashMap<String, i64>,
    ) -> Result<AppliedWindow, DataError> {
        view_total::apply_increments(self.pool(), window_id, counts)
            .await
            .map_err(Into::into)
    }

    async fn accumulated_views(
        &self,
        content_id: &str,
        as_of: NaiveDate,
    ) -> Result<i64, DataError> {
        view_total::accumulated_views(self.pool(), content_id, as_of)
            .await
            .map_err(Into::into)
    }

    async fn total_views(&self, content_id: &str) -> Result<i64, DataError> {
        view_total::total_views(self.pool(), content_id)
            .await
            .map_err(Into::into)
    }
}
