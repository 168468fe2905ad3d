//! Storage error types.

use std::fmt;

use tandem_core::CoreError;

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    /// A unique field already holds the value.
    #[error("Record already exists: {kind} with {field} = {value}")]
    AlreadyExists {
        kind: String,
        field: String,
        value: String,
    },

    /// The record data is invalid.
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(
        kind: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_record(err.to_string())
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Infrastructure,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("user", "123");
        assert_eq!(err.to_string(), "Record not found: user/123");

        let err = StorageError::already_exists("user", "email", "a@example.com");
        assert_eq!(
            err.to_string(),
            "Record already exists: user with email = a@example.com"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            StorageError::not_found("user", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("user", "email", "x").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::connection_error("refused").category().to_string(),
            "infrastructure"
        );
        assert!(StorageError::not_found("user", "1").is_not_found());
        assert!(!StorageError::internal("x").is_already_exists());
    }
}
