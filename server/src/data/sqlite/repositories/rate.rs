//! Settlement rate repository for SQLite operations

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{NewSettlementRate, SettlementRate, SettlementType};
use crate::utils::time::secs_to_datetime;

type RateTuple = (i64, String, i64, Option<i64>, Option<i64>, Option<i64>, i64);

const SELECT_RATE: &str = r#"
    SELECT id, settlement_type, min_views, max_views, applied_at, expired_at, rate_value
    FROM settlement_rates
"#;

fn map_instant(column: &'static str, secs: Option<i64>) -> Result<Option<DateTime<Utc>>, SqliteError> {
    secs.map(|s| secs_to_datetime(s).ok_or_else(|| SqliteError::invalid_value(column, s)))
        .transpose()
}

fn map_rate(row: RateTuple) -> Result<SettlementRate, SqliteError> {
    let (id, settlement_type, min_views, max_views, applied_at, expired_at, rate_value) = row;
    let settlement_type = settlement_type
        .parse::<SettlementType>()
        .map_err(|_| SqliteError::invalid_value("settlement_type", &settlement_type))?;

    Ok(SettlementRate {
        id,
        settlement_type,
        min_views,
        max_views,
        applied_at: map_instant("applied_at", applied_at)?,
        expired_at: map_instant("expired_at", expired_at)?,
        rate_value,
    })
}

/// Insert a rate tier
pub async fn insert_rate(pool: &SqlitePool, rate: &NewSettlementRate) -> Result<i64, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let result: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO settlement_rates
            (settlement_type, min_views, max_views, applied_at, expired_at, rate_value, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(rate.settlement_type.as_str())
    .bind(rate.min_views)
    .bind(rate.max_views)
    .bind(rate.applied_at.map(|t| t.timestamp()))
    .bind(rate.expired_at.map(|t| t.timestamp()))
    .bind(rate.rate_value)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// All tiers of one settlement type, ordered by id
pub async fn list_rates(
    pool: &SqlitePool,
    settlement_type: SettlementType,
) -> Result<Vec<SettlementRate>, SqliteError> {
    let sql = format!("{} WHERE settlement_type = ? ORDER BY id", SELECT_RATE);
    let rows = sqlx::query_as::<_, RateTuple>(&sql)
        .bind(settlement_type.as_str())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(map_rate).collect()
}

/// Tiers whose view range contains `views` and whose validity contains `as_of`
///
/// Returns every candidate; picking one is the caller's job.
pub async fn find_candidate_rates(
    pool: &SqlitePool,
    settlement_type: SettlementType,
    views: i64,
    as_of: DateTime<Utc>,
) -> Result<Vec<SettlementRate>, SqliteError> {
    let sql = format!(
        r#"{}
        WHERE settlement_type = ?
          AND min_views <= ?
          AND (max_views IS NULL OR max_views >= ?)
          AND (applied_at IS NULL OR applied_at <= ?)
          AND (expired_at IS NULL OR expired_at >= ?)
        ORDER BY id"#,
        SELECT_RATE
    );
    let at = as_of.timestamp();
    let rows = sqlx::query_as::<_, RateTuple>(&sql)
        .bind(settlement_type.as_str())
        .bind(views)
        .bind(views)
        .bind(at)
        .bind(at)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(map_rate).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::data::sqlite::test_pool;

    fn tier(min: i64, max: Option<i64>, rate_value: i64) -> NewSettlementRate {
        NewSettlementRate {
            settlement_type: SettlementType::Content,
            min_views: min,
            max_views: max,
            applied_at: None,
            expired_at: None,
            rate_value,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let pool = test_pool().await;
        let id = insert_rate(&pool, &tier(0, Some(999), 10)).await.unwrap();
        insert_rate(
            &pool,
            &NewSettlementRate {
                settlement_type: SettlementType::Advertisement,
                ..tier(0, None, 1)
            },
        )
        .await
        .unwrap();

        let rates = list_rates(&pool, SettlementType::Content).await.unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].id, id);
        assert_eq!(rates[0].max_views, Some(999));
        assert_eq!(rates[0].applied_at, None);
    }

    #[tokio::test]
    async fn test_candidates_respect_view_bounds() {
        let pool = test_pool().await;
        insert_rate(&pool, &tier(0, Some(999), 10)).await.unwrap();
        insert_rate(&pool, &tier(1000, None, 8)).await.unwrap();

        let now = Utc::now();
        let low = find_candidate_rates(&pool, SettlementType::Content, 999, now)
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].rate_value, 10);

        let high = find_candidate_rates(&pool, SettlementType::Content, 1000, now)
            .await
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].rate_value, 8);
    }

    #[tokio::test]
    async fn test_candidates_respect_validity_window() {
        let pool = test_pool().await;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        insert_rate(
            &pool,
            &NewSettlementRate {
                applied_at: Some(start),
                expired_at: Some(end),
                ..tier(0, None, 5)
            },
        )
        .await
        .unwrap();

        let before = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 1).unwrap();
        for (at, expected) in [(before, 0), (start, 1), (end, 1), (after, 0)] {
            let found = find_candidate_rates(&pool, SettlementType::Content, 10, at)
                .await
                .unwrap();
            assert_eq!(found.len(), expected, "at {}", at);
        }
    }
}
