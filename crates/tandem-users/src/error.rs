//! Users domain errors.

use tandem_core::CoreError;
use tandem_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// Input failed validation.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Email or username is already taken.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("User with ID {id} not found")]
    NotFound { id: String },

    #[error("Password hashing failed: {message}")]
    PasswordHash { message: String },

    #[error(transparent)]
    Storage(StorageError),

    #[error("Cache configuration error: {0}")]
    Core(#[from] CoreError),
}

impl UserError {
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    #[must_use]
    pub fn password_hash(message: impl Into<String>) -> Self {
        Self::PasswordHash {
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for UserError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id, .. } => Self::NotFound { id },
            StorageError::AlreadyExists { field, .. } => {
                Self::conflict(format!("{field} already in use"))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<argon2::password_hash::Error> for UserError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::password_hash(err.to_string())
    }
}

pub type UserResult<T> = Result<T, UserError>;
