//! SQLite error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be mapped back to its domain type
    #[error("Invalid value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl SqliteError {
    pub fn invalid_value(column: &'static str, value: impl ToString) -> Self {
        Self::InvalidValue {
            column,
            value: value.to_string(),
        }
    }
}
