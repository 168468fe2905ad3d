//! Configuration sections for the cache layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tandem_core::{
    DEFAULT_HASH_THRESHOLD, DEFAULT_ID_LOOKUP_OPERATION, DEFAULT_WRITE_VOCABULARY,
    InvalidationPolicy, KeyCodec, OperationName, OperationOverride,
};

use crate::bulk::DEFAULT_SCAN_BATCH_SIZE;
use crate::error::CacheResult;

/// Redis connection settings (the cache falls back to memory without it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis as the cache store. Default: false
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Wait/create/recycle timeout of pooled connections in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection probes before falling back to the memory store
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_connect_attempts() -> u32 {
    5
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.trim().is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        if self.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        if self.connect_attempts == 0 {
            return Err("redis.connect_attempts must be > 0".into());
        }
        Ok(())
    }
}

/// Cache-aside behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for cacheable operations that declare none
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Argument fingerprints longer than this are hashed
    #[serde(default = "default_hash_threshold")]
    pub hash_threshold: usize,

    /// Keys per scan page and per delete batch
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,

    /// Upper bound for a single cache read or write
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Upper bound for applying one invalidation pattern
    #[serde(default = "default_invalidation_timeout_ms")]
    pub invalidation_timeout_ms: u64,

    /// Operation whose keys receive identifier-scoped invalidation
    #[serde(default = "default_id_lookup_operation")]
    pub id_lookup_operation: String,

    /// Name prefixes that mark undeclared operations as writes
    #[serde(default = "default_write_vocabulary")]
    pub write_vocabulary: Vec<String>,

    #[serde(default)]
    pub overrides: Vec<OperationOverride>,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_hash_threshold() -> usize {
    DEFAULT_HASH_THRESHOLD
}

fn default_scan_batch_size() -> usize {
    DEFAULT_SCAN_BATCH_SIZE
}

fn default_operation_timeout_ms() -> u64 {
    250
}

fn default_invalidation_timeout_ms() -> u64 {
    2000
}

fn default_id_lookup_operation() -> String {
    DEFAULT_ID_LOOKUP_OPERATION.to_string()
}

fn default_write_vocabulary() -> Vec<String> {
    DEFAULT_WRITE_VOCABULARY
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            hash_threshold: default_hash_threshold(),
            scan_batch_size: default_scan_batch_size(),
            operation_timeout_ms: default_operation_timeout_ms(),
            invalidation_timeout_ms: default_invalidation_timeout_ms(),
            id_lookup_operation: default_id_lookup_operation(),
            write_vocabulary: default_write_vocabulary(),
            overrides: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        if self.hash_threshold == 0 {
            return Err("cache.hash_threshold must be > 0".into());
        }
        if self.scan_batch_size == 0 {
            return Err("cache.scan_batch_size must be > 0".into());
        }
        if self.operation_timeout_ms == 0 || self.invalidation_timeout_ms == 0 {
            return Err("cache timeouts must be > 0".into());
        }
        if self.write_vocabulary.iter().any(|t| t.trim().is_empty()) {
            return Err("cache.write_vocabulary must not contain empty terms".into());
        }
        OperationName::new(self.id_lookup_operation.as_str())
            .map_err(|e| format!("cache.id_lookup_operation: {e}"))?;
        Ok(())
    }

    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            scan_batch_size: self.scan_batch_size,
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            invalidation_timeout: Duration::from_millis(self.invalidation_timeout_ms),
        }
    }

    pub fn codec(&self) -> KeyCodec {
        KeyCodec::new(self.hash_threshold)
    }

    pub fn policy(&self) -> CacheResult<InvalidationPolicy> {
        let id_lookup = OperationName::new(self.id_lookup_operation.as_str())?;
        Ok(InvalidationPolicy::new(
            self.write_vocabulary.iter().cloned(),
            id_lookup,
        ))
    }
}

/// Runtime knobs of the cache-aside interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_ttl: Duration,
    pub scan_batch_size: usize,
    pub operation_timeout: Duration,
    pub invalidation_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheConfig::default().settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = CacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(RedisConfig::default().validate().is_ok());

        let settings = cfg.settings();
        assert_eq!(settings.scan_batch_size, 100);
        assert_eq!(settings.default_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_values_rejected() {
        let cfg = CacheConfig {
            default_ttl_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CacheConfig {
            scan_batch_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let redis = RedisConfig {
            enabled: true,
            connect_attempts: 0,
            ..Default::default()
        };
        assert!(redis.validate().is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let cfg = CacheConfig {
            write_vocabulary: vec!["archive".into()],
            ..Default::default()
        };
        let policy = cfg.policy().unwrap();
        assert!(policy.is_write_name("archiveAll"));
        assert!(!policy.is_write_name("update"));
    }

    #[test]
    fn test_deserialize_with_overrides() {
        let raw = r#"{
            "default_ttl_secs": 60,
            "overrides": [
                {"scope": "typeorm:users:user", "operation": "findByEmail", "ttl_secs": 900}
            ]
        }"#;
        let cfg: CacheConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.default_ttl_secs, 60);
        assert_eq!(cfg.hash_threshold, 100);
        assert_eq!(cfg.overrides.len(), 1);
        assert_eq!(cfg.overrides[0].ttl_secs, Some(900));
    }
}
