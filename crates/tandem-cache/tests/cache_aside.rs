//! End-to-end behavior of the cache-aside interceptor over the memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tandem_cache::{
    CacheAside, CacheError, CacheResult, CacheSettings, CacheStore, CacheValue, MemoryCacheStore,
};
use tandem_core::{CallArgs, EntityScope, InvalidationPattern, OperationSpec, call_args};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    #[serde(rename = "firstName")]
    first_name: String,
}

impl CacheValue for User {}

fn scope() -> Arc<EntityScope> {
    Arc::new(EntityScope::new("typeorm", "users", "user").unwrap())
}

fn find_by_id() -> OperationSpec {
    OperationSpec::read(scope(), "findById")
        .unwrap()
        .cacheable()
        .with_ttl(Duration::from_secs(3600))
}

fn find_all() -> OperationSpec {
    OperationSpec::read(scope(), "findAll")
        .unwrap()
        .cacheable()
        .with_ttl(Duration::from_secs(3600))
}

fn user(first_name: &str) -> User {
    User {
        id: "abc123".into(),
        first_name: first_name.into(),
    }
}

#[tokio::test]
async fn test_update_invalidates_find_by_id_and_find_all() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = CacheAside::new(store.clone());
    let db = parking_lot::Mutex::new(user("A"));

    let first: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(db.lock().clone())) })
        .await;
    assert_eq!(first.unwrap().unwrap().first_name, "A");
    let all: Result<Vec<User>, ()> = cache
        .call(&find_all(), &CallArgs::new(), || async { Ok(vec![db.lock().clone()]) })
        .await;
    assert_eq!(all.unwrap().len(), 1);

    assert!(
        store
            .get("typeorm:users:user:findById:abc123")
            .await
            .unwrap()
            .is_some()
    );
    assert!(store.get("typeorm:users:user:findAll:").await.unwrap().is_some());

    let update = OperationSpec::write(scope(), "update").unwrap();
    let written: Result<User, ()> = cache
        .call(&update, &call_args!["abc123", json!({"firstName": "B"})], || async {
            let mut row = db.lock();
            row.first_name = "B".into();
            Ok(row.clone())
        })
        .await;
    assert_eq!(written.unwrap().first_name, "B");

    assert_eq!(store.len().await.unwrap(), 0);

    let fresh: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(db.lock().clone())) })
        .await;
    assert_eq!(fresh.unwrap().unwrap().first_name, "B");
}

#[tokio::test]
async fn test_failed_write_leaves_cache_intact() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = CacheAside::new(store.clone());

    let _: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(user("A"))) })
        .await;

    let update = OperationSpec::write(scope(), "update").unwrap();
    let result: Result<User, String> = cache
        .call(&update, &call_args!["abc123"], || async { Err("constraint violation".to_string()) })
        .await;
    assert_eq!(result.unwrap_err(), "constraint violation");
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_negative_results_are_not_cached() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = CacheAside::new(store.clone());
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let missing: Result<Option<User>, ()> = cache
            .call(&find_by_id(), &call_args!["nobody"], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await;
        assert_eq!(missing, Ok(None));

        let empty: Result<Vec<User>, ()> = cache
            .call(&find_all(), &CallArgs::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .await;
        assert!(empty.unwrap().is_empty());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(store.len().await.unwrap(), 0);
    assert_eq!(cache.stats().skipped_sets, 4);

    let found: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["nobody"], || async { Ok(Some(user("Late"))) })
        .await;
    assert_eq!(found.unwrap().unwrap().first_name, "Late");
}

#[tokio::test]
async fn test_explicit_patterns_replace_derived_ones() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = CacheAside::new(store.clone());

    let _: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(user("A"))) })
        .await;
    let _: Result<Vec<User>, ()> = cache
        .call(&find_all(), &CallArgs::new(), || async { Ok(vec![user("A")]) })
        .await;

    let touch = OperationSpec::write(scope(), "touchListing")
        .unwrap()
        .invalidating(vec![
            InvalidationPattern::parse("typeorm:users:user:findAll*").unwrap(),
        ]);
    let _: Result<bool, ()> = cache.call(&touch, &call_args!["abc123"], || async { Ok(true) }).await;

    assert!(store.get("typeorm:users:user:findAll:").await.unwrap().is_none());
    assert!(
        store
            .get("typeorm:users:user:findById:abc123")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_write_without_identifier_clears_whole_scope() {
    let store = Arc::new(MemoryCacheStore::new());
    let cache = CacheAside::new(store.clone());
    store
        .set("typeorm:users:user:findById:abc123", vec![0xc0], Duration::from_secs(60))
        .await
        .unwrap();
    store
        .set("typeorm:users:account:findById:abc123", vec![0xc0], Duration::from_secs(60))
        .await
        .unwrap();

    let create = OperationSpec::new(scope(), "createUser").unwrap();
    let _: Result<User, ()> = cache
        .call(&create, &call_args![json!({"firstName": "C"})], || async { Ok(user("C")) })
        .await;

    assert_eq!(store.len().await.unwrap(), 1);
    assert!(
        store
            .get("typeorm:users:account:findById:abc123")
            .await
            .unwrap()
            .is_some()
    );
}

/// A store whose every call fails or stalls.
struct BrokenStore {
    stall: bool,
}

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn scan(
        &self,
        _cursor: u64,
        _pattern: &str,
        _count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Err(CacheError::unavailable("connection refused"))
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete_many(&self, _keys: &[String]) -> CacheResult<usize> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn len(&self) -> CacheResult<usize> {
        Err(CacheError::unavailable("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn test_unreachable_store_degrades_to_direct_calls() {
    let cache = CacheAside::new(Arc::new(BrokenStore { stall: false }));

    let read: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(user("A"))) })
        .await;
    assert_eq!(read.unwrap().unwrap().first_name, "A");

    let update = OperationSpec::write(scope(), "update").unwrap();
    let write: Result<User, ()> = cache
        .call(&update, &call_args!["abc123"], || async { Ok(user("B")) })
        .await;
    assert_eq!(write.unwrap().first_name, "B");

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
    assert!(stats.failures >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_store_is_bounded_by_timeouts() {
    let settings = CacheSettings {
        operation_timeout: Duration::from_millis(50),
        invalidation_timeout: Duration::from_millis(100),
        ..CacheSettings::default()
    };
    let cache = CacheAside::new(Arc::new(BrokenStore { stall: true })).with_settings(settings);

    let started = tokio::time::Instant::now();
    let read: Result<Option<User>, ()> = cache
        .call(&find_by_id(), &call_args!["abc123"], || async { Ok(Some(user("A"))) })
        .await;
    assert!(read.unwrap().is_some());

    let update = OperationSpec::write(scope(), "update").unwrap();
    let write: Result<User, ()> = cache
        .call(&update, &call_args!["abc123"], || async { Ok(user("B")) })
        .await;
    assert!(write.is_ok());

    assert!(started.elapsed() < Duration::from_secs(1));
}
