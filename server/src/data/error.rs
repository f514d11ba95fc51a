//! Unified error type for data layer
//!
//! Domain services see storage failures only through `DataError`, so the
//! repository traits can be backed by SQLite or by test doubles.

use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be mapped to its domain type
    #[error("Invalid value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    /// Arithmetic overflow while aggregating stored values
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl DataError {
    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) | Self::InvalidValue { .. } => "sqlite",
            Self::MigrationFailed { backend, .. } => backend,
            Self::Io(_) | Self::Overflow(_) => "unknown",
        }
    }
}

impl From<crate::data::sqlite::SqliteError> for DataError {
    fn from(e: crate::data::sqlite::SqliteError) -> Self {
        use crate::data::sqlite::SqliteError;
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "sqlite",
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
            SqliteError::InvalidValue { column, value } => Self::InvalidValue { column, value },
            SqliteError::Overflow(msg) => Self::Overflow(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteError;

    #[test]
    fn test_migration_failed_error_display() {
        let err: DataError = SqliteError::MigrationFailed {
            version: 2,
            name: "add_ledger_index".to_string(),
            error: "syntax error".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_ledger_index) failed on sqlite: syntax error"
        );
        assert_eq!(err.backend(), "sqlite");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_from_sqlite_error_keeps_context() {
        let err: DataError = SqliteError::invalid_value("period", "HOURLY").into();
        assert!(matches!(err, DataError::InvalidValue { column: "period", .. }));
        assert_eq!(err.backend(), "sqlite");

        let err: DataError = SqliteError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::Sqlite(sqlx::Error::PoolClosed).is_transient());
        assert!(!DataError::Sqlite(sqlx::Error::RowNotFound).is_transient());
        assert!(!DataError::Overflow("sum".into()).is_transient());
    }
}
