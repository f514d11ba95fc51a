//! Member and content catalog fixtures
//!
//! Member and content management live outside this service; its tables are
//! only read to resolve watch record references. These inserts seed them in
//! tests.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;

/// Insert a member (no-op if it already exists)
pub async fn upsert_member(
    pool: &SqlitePool,
    id: &str,
    display_name: Option<&str>,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO members (id, display_name, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a content item (no-op if it already exists)
pub async fn upsert_content(
    pool: &SqlitePool,
    id: &str,
    creator_id: &str,
    title: &str,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO contents (id, creator_id, title, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET title = excluded.title
        "#,
    )
    .bind(id)
    .bind(creator_id)
    .bind(title)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Check if a content exists
pub async fn content_exists(pool: &SqlitePool, id: &str) -> Result<bool, SqliteError> {
    let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contents WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(result.0 > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::test_pool;

    #[tokio::test]
    async fn test_upsert_content_requires_member() {
        let pool = test_pool().await;

        // Foreign keys are on for test pools too
        assert!(upsert_content(&pool, "c1", "ghost", "Title").await.is_err());

        upsert_member(&pool, "m1", Some("Creator")).await.unwrap();
        upsert_content(&pool, "c1", "m1", "Title").await.unwrap();
        upsert_content(&pool, "c1", "m1", "Renamed").await.unwrap();
        assert!(content_exists(&pool, "c1").await.unwrap());
        assert!(!content_exists(&pool, "c2").await.unwrap());
    }

    #[tokio::test]
    async fn test_content_id_rejects_key_separator() {
        let pool = test_pool().await;
        upsert_member(&pool, "m1", None).await.unwrap();
        assert!(upsert_content(&pool, "bad:id", "m1", "Title").await.is_err());
    }
}
