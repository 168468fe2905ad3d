//! The key/value contract behind the cache-aside interceptor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, CacheResult};

/// A shared key/value store with per-entry expiry and cursor iteration.
///
/// Keys are plain strings; values are opaque bytes. Cursor `0` starts an
/// iteration and a returned cursor of `0` ends it. A scan may return keys
/// that do not match the `MATCH` hint or repeat keys across pages; callers
/// confirm and de-duplicate.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads a value. A missing or expired key is `Ok(None)`.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Writes a value, replacing any previous one. A zero TTL is rejected.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Removes a key. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Returns the next page of keys and the cursor to continue from.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> CacheResult<(u64, Vec<String>)>;

    /// Lists every key matching `pattern` in one call.
    ///
    /// This walks the whole keyspace on the server and is only used as a
    /// fallback when scanning fails.
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Removes a batch of keys in one round trip and returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize>;

    /// Number of live keys, for diagnostics.
    async fn len(&self) -> CacheResult<usize>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        (**self).delete(key).await
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        (**self).scan(cursor, pattern, count).await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        (**self).keys(pattern).await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        (**self).delete_many(keys).await
    }

    async fn len(&self) -> CacheResult<usize> {
        (**self).len().await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Rejects TTLs that would create entries that never expire.
pub(crate) fn require_ttl(key: &str, ttl: Duration) -> CacheResult<()> {
    if ttl.is_zero() {
        return Err(CacheError::invalid_ttl(key, ttl));
    }
    Ok(())
}
