//! Settlement repository for SQLite operations

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{PreviousSettlementSnapshot, SettlementResult, SettlementRow};
use crate::utils::time::{format_date, parse_date};

type SettlementTuple = (
    i64,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    Option<i64>,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
);

const SELECT_SETTLEMENT: &str = r#"
    SELECT id, run_id, content_id, settlement_date, accumulated_views, ad_view_count,
           content_rate_id, ad_rate_id, period_total_content_revenue, period_total_ad_revenue,
           previous_content_revenue, previous_ad_revenue,
           incremental_content_revenue, incremental_ad_revenue, created_at
    FROM settlements
"#;

fn map_settlement(row: SettlementTuple) -> Result<SettlementRow, SqliteError> {
    let (
        id,
        run_id,
        content_id,
        settlement_date,
        accumulated_views,
        ad_view_count,
        content_rate_id,
        ad_rate_id,
        period_total_content_revenue,
        period_total_ad_revenue,
        previous_content_revenue,
        previous_ad_revenue,
        incremental_content_revenue,
        incremental_ad_revenue,
        created_at,
    ) = row;

    let settlement_date = parse_date(&settlement_date)
        .ok_or_else(|| SqliteError::invalid_value("settlement_date", &settlement_date))?;

    Ok(SettlementRow {
        id,
        run_id,
        result: SettlementResult {
            content_id,
            settlement_date,
            accumulated_views,
            ad_view_count,
            content_rate_id,
            ad_rate_id,
            period_total_content_revenue,
            period_total_ad_revenue,
            previous_content_revenue,
            previous_ad_revenue,
            incremental_content_revenue,
            incremental_ad_revenue,
        },
        created_at,
    })
}

/// Append a settlement
pub async fn insert_settlement(
    pool: &SqlitePool,
    run_id: &str,
    result: &SettlementResult,
) -> Result<i64, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO settlements
            (run_id, content_id, settlement_date, accumulated_views, ad_view_count,
             content_rate_id, ad_rate_id, period_total_content_revenue, period_total_ad_revenue,
             previous_content_revenue, previous_ad_revenue,
             incremental_content_revenue, incremental_ad_revenue, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(run_id)
    .bind(&result.content_id)
    .bind(format_date(result.settlement_date))
    .bind(result.accumulated_views)
    .bind(result.ad_view_count)
    .bind(result.content_rate_id)
    .bind(result.ad_rate_id)
    .bind(result.period_total_content_revenue)
    .bind(result.period_total_ad_revenue)
    .bind(result.previous_content_revenue)
    .bind(result.previous_ad_revenue)
    .bind(result.incremental_content_revenue)
    .bind(result.incremental_ad_revenue)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent settlement strictly before `before`
pub async fn latest_before(
    pool: &SqlitePool,
    content_id: &str,
    before: NaiveDate,
) -> Result<Option<SettlementRow>, SqliteError> {
    let sql = format!(
        "{} WHERE content_id = ? AND settlement_date < ? ORDER BY settlement_date DESC, id DESC LIMIT 1",
        SELECT_SETTLEMENT
    );
    let row = sqlx::query_as::<_, SettlementTuple>(&sql)
        .bind(content_id)
        .bind(format_date(before))
        .fetch_optional(pool)
        .await?;

    row.map(map_settlement).transpose()
}

/// Cumulative payout as of the last settlement before `before`
///
/// Zero when the content has never been settled.
pub async fn previous_snapshot(
    pool: &SqlitePool,
    content_id: &str,
    before: NaiveDate,
) -> Result<PreviousSettlementSnapshot, SqliteError> {
    Ok(latest_before(pool, content_id, before)
        .await?
        .map(|row| row.result.as_snapshot())
        .unwrap_or_else(|| PreviousSettlementSnapshot::zero(content_id)))
}
