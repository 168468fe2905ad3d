//! Pattern-based bulk deletion.

use std::collections::BTreeSet;

use tandem_core::{InvalidationPattern, PatternMatcher};

use crate::error::CacheResult;
use crate::store::CacheStore;

/// Default number of keys requested per scan page and deleted per batch.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Outcome of one [`delete_by_pattern`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Candidates confirmed against the pattern.
    pub matched: usize,
    /// Keys the store reported as removed.
    pub deleted: usize,
    /// Delete round trips issued.
    pub batches: usize,
    /// The scan path failed and the full `keys` listing was used.
    pub degraded: bool,
}

/// Lists every key matching `pattern` with cursor scans, sorted and deduplicated.
///
/// Never falls back to the full key listing.
pub async fn matching_keys<S>(
    store: &S,
    pattern: &InvalidationPattern,
    batch_size: usize,
) -> CacheResult<Vec<String>>
where
    S: CacheStore + ?Sized,
{
    let matcher = pattern.matcher()?;
    let mut keys = BTreeSet::new();
    let mut cursor = 0;
    loop {
        let (next, page) = store
            .scan(cursor, pattern.as_str(), batch_size.max(1))
            .await?;
        keys.extend(page.into_iter().filter(|key| matcher.matches(key)));
        if next == 0 {
            return Ok(keys.into_iter().collect());
        }
        cursor = next;
    }
}

/// Deletes every key matching `pattern`.
///
/// Keys are gathered with cursor scans of `batch_size` keys per page, each
/// candidate is confirmed against the compiled pattern client-side, and
/// confirmed keys are removed as pages arrive in batches of at most
/// `batch_size` keys. If any scan or delete on that path fails, the store's
/// full listing is tried once for the keys still present; if the listing
/// fails too, the first error is returned.
pub async fn delete_by_pattern<S>(
    store: &S,
    pattern: &InvalidationPattern,
    batch_size: usize,
) -> CacheResult<DeleteReport>
where
    S: CacheStore + ?Sized,
{
    let batch_size = batch_size.max(1);
    let matcher = pattern.matcher()?;
    let mut report = DeleteReport::default();

    if let Err(scan_err) = delete_scanned(store, pattern, &matcher, batch_size, &mut report).await {
        tracing::warn!(
            pattern = %pattern,
            backend = store.backend_name(),
            error = %scan_err,
            "cache scan delete failed, falling back to full key listing"
        );
        report.degraded = true;
        let keys = match store.keys(pattern.as_str()).await {
            Ok(keys) => keys,
            Err(keys_err) => {
                tracing::warn!(
                    pattern = %pattern,
                    error = %keys_err,
                    "cache key listing failed"
                );
                return Err(scan_err);
            }
        };
        let confirmed: Vec<String> = keys
            .into_iter()
            .filter(|key| matcher.matches(key))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        report.matched = report.deleted + confirmed.len();
        for batch in confirmed.chunks(batch_size) {
            report.deleted += store.delete_many(batch).await?;
            report.batches += 1;
        }
    }

    tracing::debug!(
        pattern = %pattern,
        matched = report.matched,
        deleted = report.deleted,
        batches = report.batches,
        degraded = report.degraded,
        "cache pattern deleted"
    );
    Ok(report)
}

async fn delete_scanned<S>(
    store: &S,
    pattern: &InvalidationPattern,
    matcher: &PatternMatcher,
    batch_size: usize,
    report: &mut DeleteReport,
) -> CacheResult<()>
where
    S: CacheStore + ?Sized,
{
    let mut pending: Vec<String> = Vec::with_capacity(batch_size);
    let mut cursor = 0;
    loop {
        let (next, page) = store.scan(cursor, pattern.as_str(), batch_size).await?;
        for key in page.into_iter().filter(|key| matcher.matches(key)) {
            if !pending.contains(&key) {
                report.matched += 1;
                pending.push(key);
            }
        }
        while pending.len() >= batch_size {
            let batch: Vec<String> = pending.drain(..batch_size).collect();
            report.deleted += store.delete_many(&batch).await?;
            report.batches += 1;
        }
        if next == 0 {
            break;
        }
        cursor = next;
    }
    if !pending.is_empty() {
        report.deleted += store.delete_many(&pending).await?;
        report.batches += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::CacheError;
    use crate::memory::MemoryCacheStore;

    const TTL: Duration = Duration::from_secs(60);

    /// Wraps a memory store, counts delete batches and can fail on demand.
    #[derive(Default)]
    struct InstrumentedStore {
        inner: MemoryCacheStore,
        fail_scan: AtomicBool,
        fail_keys: AtomicBool,
        fail_next_delete: AtomicBool,
        duplicate_pages: AtomicBool,
        batch_sizes: parking_lot::Mutex<Vec<usize>>,
        keys_calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for InstrumentedStore {
        async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> CacheResult<()> {
            self.inner.delete(key).await
        }

        async fn scan(
            &self,
            cursor: u64,
            pattern: &str,
            count: usize,
        ) -> CacheResult<(u64, Vec<String>)> {
            if self.fail_scan.load(Ordering::SeqCst) {
                return Err(CacheError::backend("ERR unknown command 'SCAN'"));
            }
            let (next, mut keys) = self.inner.scan(cursor, pattern, count).await?;
            if self.duplicate_pages.load(Ordering::SeqCst) {
                keys.extend(keys.clone());
                keys.push("s:n:other:op:stray".to_string());
            }
            Ok((next, keys))
        }

        async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
            self.keys_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_keys.load(Ordering::SeqCst) {
                return Err(CacheError::backend("ERR keys disabled"));
            }
            self.inner.keys(pattern).await
        }

        async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
            if self.fail_next_delete.swap(false, Ordering::SeqCst) {
                return Err(CacheError::backend("ERR connection reset"));
            }
            self.batch_sizes.lock().push(keys.len());
            self.inner.delete_many(keys).await
        }

        async fn len(&self) -> CacheResult<usize> {
            self.inner.len().await
        }

        fn backend_name(&self) -> &'static str {
            "instrumented"
        }
    }

    async fn seeded(count: usize) -> InstrumentedStore {
        let store = InstrumentedStore::default();
        for i in 0..count {
            store
                .set(&format!("s:n:e:findById:{i:04}"), vec![1], TTL)
                .await
                .unwrap();
        }
        store.set("s:n:other:op:1", vec![1], TTL).await.unwrap();
        store.set("s:m:e:op:1", vec![1], TTL).await.unwrap();
        store
    }

    fn entity_wide() -> InvalidationPattern {
        InvalidationPattern::parse("s:n:e:*").unwrap()
    }

    #[tokio::test]
    async fn test_large_keyspace_deleted_in_bounded_batches() {
        let store = seeded(250).await;
        let batch = 40;

        let report = delete_by_pattern(&store, &entity_wide(), batch).await.unwrap();

        assert_eq!(report.matched, 250);
        assert_eq!(report.deleted, 250);
        assert!(!report.degraded);
        assert!(report.batches >= 250usize.div_ceil(batch));
        let sizes = store.batch_sizes.lock().clone();
        assert_eq!(sizes.len(), report.batches);
        assert!(sizes.iter().all(|n| *n <= batch));
        assert_eq!(store.keys_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_run_deletes_nothing() {
        let store = seeded(30).await;
        let first = delete_by_pattern(&store, &entity_wide(), 10).await.unwrap();
        assert_eq!(first.deleted, 30);

        let second = delete_by_pattern(&store, &entity_wide(), 10).await.unwrap();
        assert_eq!(second.matched, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.batches, 0);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_candidates_confirmed_and_deduplicated() {
        let store = seeded(12).await;
        store.duplicate_pages.store(true, Ordering::SeqCst);

        let report = delete_by_pattern(&store, &entity_wide(), 5).await.unwrap();
        assert_eq!(report.matched, 12);
        assert_eq!(report.deleted, 12);
        assert_eq!(store.get("s:n:other:op:1").await.unwrap(), Some(vec![1]));
    }

    #[tokio::test]
    async fn test_identifier_pattern_is_narrow() {
        let store = seeded(20).await;
        let pattern = InvalidationPattern::parse("s:n:e:findById:0007*").unwrap();
        let report = delete_by_pattern(&store, &pattern, 100).await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(store.len().await.unwrap(), 21);
    }

    #[tokio::test]
    async fn test_scan_failure_falls_back_to_listing_once() {
        let store = seeded(15).await;
        store.fail_scan.store(true, Ordering::SeqCst);

        let report = delete_by_pattern(&store, &entity_wide(), 4).await.unwrap();
        assert!(report.degraded);
        assert_eq!(report.deleted, 15);
        assert_eq!(report.batches, 4);
        assert_eq!(store.keys_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_failure_returns_scan_error() {
        let store = seeded(3).await;
        store.fail_scan.store(true, Ordering::SeqCst);
        store.fail_keys.store(true, Ordering::SeqCst);

        let err = delete_by_pattern(&store, &entity_wide(), 10).await.unwrap_err();
        assert!(err.to_string().contains("SCAN"));
        assert_eq!(store.len().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_delete_batch_falls_back_to_listing() {
        let store = seeded(30).await;
        store.fail_next_delete.store(true, Ordering::SeqCst);

        let report = delete_by_pattern(&store, &entity_wide(), 10).await.unwrap();
        assert!(report.degraded);
        assert_eq!(report.matched, 30);
        assert_eq!(report.deleted, 30);
        assert_eq!(store.keys_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_matching_keys_scans_without_listing_or_deleting() {
        let store = seeded(25).await;
        store.duplicate_pages.store(true, Ordering::SeqCst);

        let keys = matching_keys(&store, &entity_wide(), 10).await.unwrap();
        assert_eq!(keys.len(), 25);
        assert_eq!(keys.first().map(String::as_str), Some("s:n:e:findById:0000"));
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.keys_calls.load(Ordering::SeqCst), 0);
        assert!(store.batch_sizes.lock().is_empty());
        assert_eq!(store.len().await.unwrap(), 27);
    }

    #[tokio::test]
    async fn test_matching_keys_reports_scan_failure() {
        let store = seeded(3).await;
        store.fail_scan.store(true, Ordering::SeqCst);
        assert!(matching_keys(&store, &entity_wide(), 10).await.is_err());
        assert_eq!(store.keys_calls.load(Ordering::SeqCst), 0);
    }
}
