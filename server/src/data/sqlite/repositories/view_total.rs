//! Durable view totals and the per-window ledger
//!
//! A window's counts are applied at most once per content: the ledger row
//! is inserted first and the running total only moves when that insert
//! actually happened.

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::core::constants::VIEW_WINDOW_SECS;
use crate::data::sqlite::SqliteError;
use crate::data::types::AppliedWindow;
use crate::utils::time::end_of_day_utc;

/// Apply one window's `content_id -> count` map in a single transaction
///
/// Non-positive counts are ignored.
pub async fn apply_increments(
    pool: &SqlitePool,
    window_id: i64,
    counts: &HashMap<String, i64>,
) -> Result<AppliedWindow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut applied = AppliedWindow::default();

    // Stable order keeps lock acquisition inside SQLite predictable
    let mut entries: Vec<(&String, &i64)> = counts.iter().filter(|(_, c)| **c > 0).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut tx = pool.begin().await?;

    for (content_id, count) in entries {
        let result = sqlx::query(
            r#"
            INSERT INTO view_count_ledger (content_id, window_id, view_count, applied_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(content_id, window_id) DO NOTHING
            "#,
        )
        .bind(content_id)
        .bind(window_id)
        .bind(*count)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            applied.skipped += 1;
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO content_view_totals (content_id, total_views, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                total_views = total_views + excluded.total_views,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(content_id)
        .bind(*count)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        applied.inserted += 1;
        applied.views = applied
            .views
            .checked_add(*count)
            .ok_or_else(|| SqliteError::Overflow(format!("window {} view sum", window_id)))?;
    }

    tx.commit().await?;
    Ok(applied)
}

/// Current lifetime total of a content (0 when never viewed)
pub async fn total_views(pool: &SqlitePool, content_id: &str) -> Result<i64, SqliteError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT total_views FROM content_view_totals WHERE content_id = ?")
            .bind(content_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|r| r.0).unwrap_or(0))
}

/// Lifetime views of a content as of the end of `as_of` (UTC)
///
/// Sums the ledger over windows that started before the next midnight.
pub async fn accumulated_views(
    pool: &SqlitePool,
    content_id: &str,
    as_of: NaiveDate,
) -> Result<i64, SqliteError> {
    let end_window = end_of_day_utc(as_of).timestamp().div_euclid(VIEW_WINDOW_SECS);
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(view_count) FROM view_count_ledger WHERE content_id = ? AND window_id < ?",
    )
    .bind(content_id)
    .bind(end_window)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    fn counts(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_apply_adds_to_totals() {
        let pool = test_pool().await;
        let first = apply_increments(&pool, 100, &counts(&[("a", 3), ("b", 2)]))
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.views, 5);

        apply_increments(&pool, 101, &counts(&[("a", 4)])).await.unwrap();
        assert_eq!(total_views(&pool, "a").await.unwrap(), 7);
        assert_eq!(total_views(&pool, "b").await.unwrap(), 2);
        assert_eq!(total_views(&pool, "c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reapplying_window_is_noop() {
        let pool = test_pool().await;
        apply_increments(&pool, 100, &counts(&[("a", 3)])).await.unwrap();
        let again = apply_increments(&pool, 100, &counts(&[("a", 3), ("b", 1)]))
            .await
            .unwrap();

        assert_eq!(again.skipped, 1);
        assert_eq!(again.inserted, 1);
        assert_eq!(total_views(&pool, "a").await.unwrap(), 3);
        assert_eq!(total_views(&pool, "b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_positive_counts_ignored() {
        let pool = test_pool().await;
        let applied = apply_increments(&pool, 5, &counts(&[("a", 0), ("b", -2)]))
            .await
            .unwrap();
        assert_eq!(applied, AppliedWindow::default());
        assert_eq!(total_views(&pool, "a").await.unwrap(), 0);
        assert_eq!(total_views(&pool, "b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_accumulated_views_as_of_date() {
        let pool = test_pool().await;
        let day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let last_window_of_day = end_of_day_utc(day).timestamp() / VIEW_WINDOW_SECS - 1;

        apply_increments(&pool, last_window_of_day - 10, &counts(&[("a", 5)]))
            .await
            .unwrap();
        apply_increments(&pool, last_window_of_day, &counts(&[("a", 2)]))
            .await
            .unwrap();
        apply_increments(&pool, last_window_of_day + 1, &counts(&[("a", 100)]))
            .await
            .unwrap();

        assert_eq!(accumulated_views(&pool, "a", day).await.unwrap(), 7);
        assert_eq!(total_views(&pool, "a").await.unwrap(), 107);
    }
}
