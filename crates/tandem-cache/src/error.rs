use std::time::Duration;

use tandem_core::CoreError;
use thiserror::Error;

/// Errors raised by cache stores and cache value codecs.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache connection unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid ttl {ttl:?} for key '{key}': cache entries must expire")]
    InvalidTtl { key: String, ttl: Duration },

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn invalid_ttl(key: impl Into<String>, ttl: Duration) -> Self {
        Self::InvalidTtl {
            key: key.into(),
            ttl,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Returns `true` if the backend could not be reached in time.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_predicate() {
        assert!(CacheError::unavailable("down").is_unavailable());
        assert!(CacheError::Timeout(Duration::from_millis(5)).is_unavailable());
        assert!(!CacheError::backend("WRONGTYPE").is_unavailable());
        assert!(!CacheError::invalid_ttl("k", Duration::ZERO).is_unavailable());
    }

    #[test]
    fn test_invalid_ttl_message_names_key() {
        let err = CacheError::invalid_ttl("typeorm:users:user:findAll:", Duration::ZERO);
        assert!(err.to_string().contains("typeorm:users:user:findAll:"));
    }
}
