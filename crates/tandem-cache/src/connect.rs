//! Cache store construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{PoolConfig, Runtime};

use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::memory::MemoryCacheStore;
use crate::redis_store::RedisCacheStore;
use crate::store::CacheStore;

const CONNECT_BACKOFF_BASE: Duration = Duration::from_millis(50);
const CONNECT_BACKOFF_MAX: Duration = Duration::from_secs(2);

/// Creates the configured cache store.
///
/// When Redis is disabled, or cannot be reached after `connect_attempts`
/// probes, the process runs on an in-memory store instead.
pub async fn connect_cache_store(config: &RedisConfig) -> Arc<dyn CacheStore> {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-memory cache store");
        return Arc::new(MemoryCacheStore::new());
    }

    match connect_redis(config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-memory cache store."
            );
            Arc::new(MemoryCacheStore::new())
        }
    }
}

/// Builds a Redis pool and probes it with capped exponential backoff.
pub async fn connect_redis(config: &RedisConfig) -> CacheResult<RedisCacheStore> {
    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::unavailable(format!("failed to create Redis pool: {e}")))?;
    let store = RedisCacheStore::new(pool);

    let attempts = config.connect_attempts.max(1);
    let mut backoff = CONNECT_BACKOFF_BASE;
    let mut attempt = 1;
    loop {
        match store.ping().await {
            Ok(()) => {
                tracing::info!(attempt, "Connected to Redis");
                return Ok(store);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    attempt,
                    attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Redis not reachable, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(CONNECT_BACKOFF_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut delay = CONNECT_BACKOFF_BASE;
        let mut seen = vec![delay];
        for _ in 0..8 {
            delay = next_backoff(delay);
            seen.push(delay);
        }
        assert_eq!(seen[1], Duration::from_millis(100));
        assert_eq!(seen[5], Duration::from_millis(1600));
        assert_eq!(seen[6], CONNECT_BACKOFF_MAX);
        assert_eq!(*seen.last().unwrap(), CONNECT_BACKOFF_MAX);
    }

    #[tokio::test]
    async fn test_disabled_redis_uses_memory() {
        let store = connect_cache_store(&RedisConfig::default()).await;
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".to_string(),
            timeout_ms: 200,
            connect_attempts: 2,
            ..Default::default()
        };
        let store = connect_cache_store(&config).await;
        assert_eq!(store.backend_name(), "memory");
    }
}
