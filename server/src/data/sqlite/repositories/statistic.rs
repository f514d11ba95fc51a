//! Period statistics repository for SQLite operations
//!
//! Rows are append-only. The current figure for a (content, period, bucket)
//! is the row with the highest id.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{PeriodKind, PeriodStatistic, PeriodStatisticRow};
use crate::utils::time::{format_date, parse_date};

type StatisticTuple = (i64, String, String, String, String, i64, i64, i64, i64, i64);

const SELECT_STATISTIC: &str = r#"
    SELECT id, run_id, content_id, period, bucket_date, view_count,
           watch_time_seconds, ad_view_count, accumulated_views, created_at
    FROM period_statistics
"#;

fn map_statistic(row: StatisticTuple) -> Result<PeriodStatisticRow, SqliteError> {
    let (
        id,
        run_id,
        content_id,
        period,
        bucket_date,
        view_count,
        watch_time_seconds,
        ad_view_count,
        accumulated_views,
        created_at,
    ) = row;

    let period = period
        .parse::<PeriodKind>()
        .map_err(|_| SqliteError::invalid_value("period", &period))?;
    let bucket_date =
        parse_date(&bucket_date).ok_or_else(|| SqliteError::invalid_value("bucket_date", &bucket_date))?;

    Ok(PeriodStatisticRow {
        id,
        run_id,
        statistic: PeriodStatistic {
            content_id,
            period,
            bucket_date,
            view_count,
            watch_time_seconds,
            ad_view_count,
            accumulated_views,
        },
        created_at,
    })
}

/// Append one run's statistics in a single transaction
pub async fn insert_statistics(
    pool: &SqlitePool,
    run_id: &str,
    statistics: &[PeriodStatistic],
) -> Result<Vec<i64>, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let mut ids = Vec::with_capacity(statistics.len());
    let mut tx = pool.begin().await?;

    for stat in statistics {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO period_statistics
                (run_id, content_id, period, bucket_date, view_count,
                 watch_time_seconds, ad_view_count, accumulated_views, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(run_id)
        .bind(&stat.content_id)
        .bind(stat.period.as_str())
        .bind(format_date(stat.bucket_date))
        .bind(stat.view_count)
        .bind(stat.watch_time_seconds)
        .bind(stat.ad_view_count)
        .bind(stat.accumulated_views)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

/// Latest row for a (content, period, bucket)
pub async fn latest_statistic(
    pool: &SqlitePool,
    content_id: &str,
    period: PeriodKind,
    bucket_date: NaiveDate,
) -> Result<Option<PeriodStatisticRow>, SqliteError> {
    let sql = format!(
        "{} WHERE content_id = ? AND period = ? AND bucket_date = ? ORDER BY id DESC LIMIT 1",
        SELECT_STATISTIC
    );
    let row = sqlx::query_as::<_, StatisticTuple>(&sql)
        .bind(content_id)
        .bind(period.as_str())
        .bind(format_date(bucket_date))
        .fetch_optional(pool)
        .await?;

    row.map(map_statistic).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    fn stat(period: PeriodKind, bucket: NaiveDate, views: i64) -> PeriodStatistic {
        PeriodStatistic {
            content_id: "c1".to_string(),
            period,
            bucket_date: bucket,
            view_count: views,
            watch_time_seconds: views * 60,
            ad_view_count: 0,
            accumulated_views: 1_000,
        }
    }

    #[tokio::test]
    async fn test_later_run_supersedes() {
        let pool = test_pool().await;
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

        insert_statistics(&pool, "run-1", &[stat(PeriodKind::Weekly, monday, 2)])
            .await
            .unwrap();
        insert_statistics(&pool, "run-2", &[stat(PeriodKind::Weekly, monday, 5)])
            .await
            .unwrap();

        let latest = latest_statistic(&pool, "c1", PeriodKind::Weekly, monday)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.run_id, "run-2");
        assert_eq!(latest.statistic.view_count, 5);

        assert!(
            latest_statistic(&pool, "c1", PeriodKind::Monthly, monday)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_insert_every_period() {
        let pool = test_pool().await;
        let day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let stats: Vec<PeriodStatistic> = PeriodKind::ALL.iter().map(|p| stat(*p, day, 1)).collect();

        let ids = insert_statistics(&pool, "run-1", &stats).await.unwrap();
        assert_eq!(ids.len(), 4);

        for period in PeriodKind::ALL {
            let row = latest_statistic(&pool, "c1", period, day)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(row.run_id, "run-1");
            assert_eq!(row.statistic.period, period);
        }
    }
}
