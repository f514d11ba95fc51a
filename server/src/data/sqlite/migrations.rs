//! Database migration system
//!
//! Handles schema versioning and incremental migrations. Version 1 is the
//! initial schema. Each applied migration records a SHA-256 of its SQL, and
//! startup warns when the recorded checksum no longer matches the shipped
//! schema.

use sqlx::SqlitePool;

use super::error::SqliteError;
use super::schema::{SCHEMA, SCHEMA_VERSION};
use crate::utils::crypto::sha256_hex;

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteError> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        tracing::debug!(
            "Initializing database with schema version {}",
            SCHEMA_VERSION
        );
        apply_initial_schema(pool).await?;
        return Ok(());
    }

    let current_version: i32 =
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    if current_version > SCHEMA_VERSION {
        return Err(SqliteError::MigrationFailed {
            version: current_version,
            name: "schema_version".to_string(),
            error: format!(
                "database is at version {} but this build supports up to {}",
                current_version, SCHEMA_VERSION
            ),
        });
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        tracing::debug!("Applying migration to version {}", version);
        apply_migration(pool, version).await?;
    }

    verify_initial_checksum(pool).await?;
    tracing::debug!(version = SCHEMA_VERSION, "Database schema is up to date");
    Ok(())
}

/// Apply the initial schema (version 1)
async fn apply_initial_schema(pool: &SqlitePool) -> Result<(), SqliteError> {
    let start = std::time::Instant::now();

    let mut tx = pool.begin().await?;

    sqlx::query(SCHEMA).execute(&mut *tx).await.map_err(|e| {
        SqliteError::MigrationFailed {
            version: 1,
            name: "initial_schema".to_string(),
            error: e.to_string(),
        }
    })?;

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description) VALUES (1, ?, ?, 'Initial schema')",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let checksum = sha256_hex(SCHEMA);
    let elapsed_ms = start.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success) VALUES (1, ?, ?, ?, ?, 1)",
    )
    .bind("initial_schema")
    .bind(now)
    .bind(&checksum)
    .bind(elapsed_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!("Applied initial schema in {}ms", elapsed_ms);
    Ok(())
}

async fn apply_migration(pool: &SqlitePool, version: i32) -> Result<(), SqliteError> {
    match version {
        // A version row of 0 means a half-initialized database
        1 => apply_initial_schema_on_existing(pool).await,
        _ => Err(SqliteError::MigrationFailed {
            version,
            name: "unknown".to_string(),
            error: format!("Unknown migration version: {}", version),
        }),
    }
}

/// Re-run the idempotent initial schema when the version row is missing
async fn apply_initial_schema_on_existing(pool: &SqlitePool) -> Result<(), SqliteError> {
    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await?;
    sqlx::query("DELETE FROM schema_migrations WHERE version = 1")
        .execute(pool)
        .await?;
    apply_initial_schema(pool).await
}

/// Warn when the recorded initial schema differs from the compiled one
async fn verify_initial_checksum(pool: &SqlitePool) -> Result<(), SqliteError> {
    let recorded: Option<String> =
        sqlx::query_scalar("SELECT checksum FROM schema_migrations WHERE version = 1")
            .fetch_optional(pool)
            .await?;

    if let Some(recorded) = recorded
        && recorded != sha256_hex(SCHEMA)
    {
        tracing::warn!(
            recorded = %recorded,
            "Initial schema checksum differs from this build; schema edits need a new migration"
        );
    }
    Ok(())
}
