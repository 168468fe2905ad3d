//! Cache-aside around arbitrary data-access calls.
//!
//! ## Read path (cacheable operations)
//!
//! 1. Build the key from the operation's scope, name and arguments
//! 2. Look it up (bounded by `operation_timeout`); a hit returns without running the call
//! 3. On a miss run the call and store non-empty `Ok` results with the operation's TTL
//!
//! ## Write path
//!
//! The call runs first. Only a successful result triggers invalidation, and
//! invalidation failures are logged, never returned.
//!
//! Concurrent misses on the same key each run the call and each populate the
//! entry; the last write wins. A read racing a write may re-populate a stale
//! entry, which lives at most for its TTL.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tandem_core::{
    CacheKey, CallArgs, Classification, EntityScope, InvalidationPattern, InvalidationPolicy,
    KeyCodec, OperationSpec,
};
use tokio::time::timeout;

use crate::bulk::delete_by_pattern;
use crate::config::{CacheConfig, CacheSettings};
use crate::error::CacheResult;
use crate::metrics;
use crate::store::CacheStore;
use crate::value::{self, CacheValue};

/// Snapshot of the interceptor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub skipped_sets: u64,
    pub invalidated_keys: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    skipped_sets: AtomicU64,
    invalidated_keys: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            skipped_sets: self.skipped_sets.load(Ordering::Relaxed),
            invalidated_keys: self.invalidated_keys.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Read-through caching and write-triggered invalidation for wrapped calls.
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    policy: InvalidationPolicy,
    codec: KeyCodec,
    settings: CacheSettings,
    counters: Counters,
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("backend", &self.store.backend_name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            policy: InvalidationPolicy::default(),
            codec: KeyCodec::default(),
            settings: CacheSettings::default(),
            counters: Counters::default(),
        }
    }

    /// Builds an interceptor with policy, codec and settings taken from configuration.
    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> CacheResult<Self> {
        Ok(Self::new(store)
            .with_policy(config.policy()?)
            .with_codec(config.codec())
            .with_settings(config.settings()))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: InvalidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: KeyCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// The key a cacheable read of `op` with `args` uses.
    pub fn key_for(&self, op: &OperationSpec, args: &CallArgs) -> CacheKey {
        self.codec.build_key(op.scope(), op.name(), args)
    }

    /// Runs `f` under the caching behavior of `op`.
    ///
    /// The result of `f` is returned unchanged; cache failures only ever
    /// turn into misses or skipped invalidations.
    pub async fn call<T, E, F, Fut>(&self, op: &OperationSpec, args: &CallArgs, f: F) -> Result<T, E>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let classification = self.policy.classify(op);
        tracing::trace!(
            operation = %op.name(),
            scope = %op.scope(),
            classification = classification.label(),
            "cache-aside call"
        );

        match classification {
            Classification::NoCache | Classification::PassThrough => f().await,
            Classification::Cacheable { ttl } => {
                let ttl = ttl.unwrap_or(self.settings.default_ttl);
                self.read_through(op, args, ttl, f).await
            }
            Classification::Write => {
                let result = f().await;
                if result.is_ok() {
                    let patterns = self.policy.write_patterns(op, args);
                    self.invalidate_patterns(&patterns).await;
                } else {
                    tracing::debug!(operation = %op.name(), "write failed, cache left untouched");
                }
                result
            }
            Classification::ExplicitInvalidate(patterns) => {
                let result = f().await;
                if result.is_ok() {
                    self.invalidate_patterns(&patterns).await;
                }
                result
            }
        }
    }

    /// Applies each pattern, returning the total number of deleted keys.
    pub async fn invalidate_patterns(&self, patterns: &[InvalidationPattern]) -> usize {
        let mut deleted = 0;
        for pattern in patterns {
            let run = delete_by_pattern(
                self.store.as_ref(),
                pattern,
                self.settings.scan_batch_size,
            );
            match timeout(self.settings.invalidation_timeout, run).await {
                Ok(Ok(report)) => {
                    deleted += report.deleted;
                    tracing::debug!(
                        pattern = %pattern,
                        deleted = report.deleted,
                        degraded = report.degraded,
                        "cache invalidated"
                    );
                }
                Ok(Err(e)) => {
                    self.record_failure("invalidate");
                    tracing::warn!(pattern = %pattern, error = %e, "cache invalidation failed");
                }
                Err(_) => {
                    self.record_failure("invalidate");
                    tracing::warn!(
                        pattern = %pattern,
                        timeout_ms = self.settings.invalidation_timeout.as_millis() as u64,
                        "cache invalidation timed out"
                    );
                }
            }
        }

        Counters::bump(&self.counters.invalidated_keys, deleted as u64);
        metrics::record_invalidated_keys(deleted);
        deleted
    }

    /// Invalidates a whole scope, plus the identifier lookups of `id` when given.
    pub async fn invalidate_scope(&self, scope: &EntityScope, id: Option<&str>) -> usize {
        let patterns = self.policy.patterns_for(scope, id);
        self.invalidate_patterns(&patterns).await
    }

    async fn read_through<T, E, F, Fut>(
        &self,
        op: &OperationSpec,
        args: &CallArgs,
        ttl: Duration,
        f: F,
    ) -> Result<T, E>
    where
        T: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let scope = op.scope().prefix();
        let key = self.key_for(op, args);

        if let Some(value) = self.lookup::<T>(&key, &scope).await {
            return Ok(value);
        }

        let value = f().await?;
        self.populate(&key, &scope, &value, ttl).await;
        Ok(value)
    }

    async fn lookup<T: CacheValue>(&self, key: &CacheKey, scope: &str) -> Option<T> {
        let bytes = match timeout(self.settings.operation_timeout, self.store.get(key.as_str())).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                self.record_miss(key, scope);
                return None;
            }
            Ok(Err(e)) => {
                self.record_failure("get");
                tracing::warn!(key = %key, error = %e, "cache GET failed, treating as miss");
                self.record_miss(key, scope);
                return None;
            }
            Err(_) => {
                self.record_failure("get");
                tracing::warn!(key = %key, "cache GET timed out, treating as miss");
                self.record_miss(key, scope);
                return None;
            }
        };

        match value::decode::<T>(&bytes) {
            Ok(value) => {
                Counters::bump(&self.counters.hits, 1);
                metrics::record_cache_hit(scope);
                tracing::debug!(key = %key, "cache hit");
                Some(value)
            }
            Err(e) => {
                self.record_failure("decode");
                tracing::warn!(key = %key, error = %e, "cached value is unreadable, discarding");
                if let Ok(Err(e)) =
                    timeout(self.settings.operation_timeout, self.store.delete(key.as_str())).await
                {
                    tracing::warn!(key = %key, error = %e, "failed to discard cached value");
                }
                self.record_miss(key, scope);
                None
            }
        }
    }

    async fn populate<T: CacheValue>(&self, key: &CacheKey, scope: &str, value: &T, ttl: Duration) {
        if value.is_empty_value() {
            Counters::bump(&self.counters.skipped_sets, 1);
            tracing::debug!(key = %key, "empty result, cache set skipped");
            return;
        }

        let bytes = match value::encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_failure("set");
                tracing::warn!(key = %key, error = %e, "result is not cacheable");
                return;
            }
        };

        match timeout(self.settings.operation_timeout, self.store.set(key.as_str(), bytes, ttl)).await {
            Ok(Ok(())) => {
                Counters::bump(&self.counters.sets, 1);
                metrics::record_cache_set(scope);
                tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
            }
            Ok(Err(e)) => {
                self.record_failure("set");
                tracing::warn!(key = %key, error = %e, "cache SET failed");
            }
            Err(_) => {
                self.record_failure("set");
                tracing::warn!(key = %key, "cache SET timed out");
            }
        }
    }

    fn record_miss(&self, key: &CacheKey, scope: &str) {
        Counters::bump(&self.counters.misses, 1);
        metrics::record_cache_miss(scope);
        tracing::debug!(key = %key, "cache miss");
    }

    fn record_failure(&self, stage: &'static str) {
        Counters::bump(&self.counters.failures, 1);
        metrics::record_cache_failure(stage);
    }
}
