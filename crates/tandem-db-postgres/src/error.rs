//! Error types for the PostgreSQL record store.

use sqlx_core::error::Error as SqlxError;
use tandem_storage::StorageError;

/// PostgreSQL error code for unique violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Name of the violated constraint, when the error is a unique violation.
pub fn unique_violation(err: &SqlxError) -> Option<String> {
    match err {
        SqlxError::Database(db_err) if has_pg_error_code(err, PG_UNIQUE_VIOLATION) => {
            Some(db_err.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

/// Errors specific to the PostgreSQL record store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or query error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Schema creation error.
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Schema { message } => {
                StorageError::internal(format!("Schema error: {message}"))
            }
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
