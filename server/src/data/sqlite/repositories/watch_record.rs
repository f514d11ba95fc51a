//! Watch record repository for SQLite operations
//!
//! Reads return `RawWatchRecord`s with member/content resolution already
//! joined in; eligibility is decided by the validation layer, not here.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{CompletionStatus, NewWatchRecord, RawWatchRecord};
use crate::utils::time::{format_date, parse_date};

type RawRecordTuple = (i64, String, String, String, i64, i64, String, bool, bool);

const SELECT_RAW: &str = r#"
    SELECT w.id, w.member_id, w.content_id, w.watched_date,
           w.last_viewed_position, w.last_ad_view_count, w.completion_status,
           m.id IS NOT NULL AS member_known,
           c.id IS NOT NULL AS content_known
    FROM watch_records w
    LEFT JOIN members m ON m.id = w.member_id
    LEFT JOIN contents c ON c.id = w.content_id
"#;

fn map_raw(row: RawRecordTuple) -> Result<RawWatchRecord, SqliteError> {
    let (
        id,
        member_id,
        content_id,
        watched_date,
        last_viewed_position,
        last_ad_view_count,
        completion_status,
        member_known,
        content_known,
    ) = row;

    let watched_date = parse_date(&watched_date)
        .ok_or_else(|| SqliteError::invalid_value("watched_date", &watched_date))?;
    let completion_status = completion_status
        .parse::<CompletionStatus>()
        .map_err(|_| SqliteError::invalid_value("completion_status", &completion_status))?;

    Ok(RawWatchRecord {
        id,
        member_id,
        content_id,
        watched_date,
        last_viewed_position,
        last_ad_view_count,
        completion_status,
        member_known,
        content_known,
    })
}

/// Insert a watch record
pub async fn insert_watch_record(
    pool: &SqlitePool,
    record: &NewWatchRecord,
) -> Result<i64, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    let result: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO watch_records
            (member_id, content_id, watched_date, last_viewed_position,
             last_ad_view_count, completion_status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&record.member_id)
    .bind(&record.content_id)
    .bind(format_date(record.watched_date))
    .bind(record.last_viewed_position)
    .bind(record.last_ad_view_count)
    .bind(record.completion_status.as_str())
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// All watch records of one day, any status
pub async fn list_for_date(
    pool: &SqlitePool,
    date: NaiveDate,
) -> Result<Vec<RawWatchRecord>, SqliteError> {
    let sql = format!("{} WHERE w.watched_date = ? ORDER BY w.content_id, w.id", SELECT_RAW);
    let rows = sqlx::query_as::<_, RawRecordTuple>(&sql)
        .bind(format_date(date))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(map_raw).collect()
}

/// Watch records of one content within `[from, to]`, any status
pub async fn list_for_content(
    pool: &SqlitePool,
    content_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<RawWatchRecord>, SqliteError> {
    let sql = format!(
        "{} WHERE w.content_id = ? AND w.watched_date BETWEEN ? AND ? ORDER BY w.watched_date, w.id",
        SELECT_RAW
    );
    let rows = sqlx::query_as::<_, RawRecordTuple>(&sql)
        .bind(content_id)
        .bind(format_date(from))
        .bind(format_date(to))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(map_raw).collect()
}

/// Lifetime ad views of a content through the end of `through`
///
/// Counts the same records the validation layer accepts: completed, with a
/// positive position, a non-negative ad count and resolvable references.
pub async fn sum_ad_views_through(
    pool: &SqlitePool,
    content_id: &str,
    through: NaiveDate,
) -> Result<i64, SqliteError> {
    let result: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT SUM(w.last_ad_view_count)
        FROM watch_records w
        JOIN members m ON m.id = w.member_id
        JOIN contents c ON c.id = w.content_id
        WHERE w.content_id = ?
          AND w.watched_date <= ?
          AND w.completion_status = 'COMPLETED'
          AND w.last_viewed_position > 0
          AND w.last_ad_view_count >= 0
        "#,
    )
    .bind(content_id)
    .bind(format_date(through))
    .fetch_one(pool)
    .await?;

    Ok(result.0.unwrap_or(0))
}
