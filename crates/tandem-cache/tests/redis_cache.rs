//! Integration tests for the Redis cache store.
//!
//! These tests use testcontainers to spin up a real Redis instance and need
//! Docker: `cargo test -p tandem-cache -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use tandem_cache::{CacheAside, CacheStore, RedisConfig, connect_cache_store, delete_by_pattern};
use tandem_core::{EntityScope, InvalidationPattern, OperationSpec, call_args};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn redis_config() -> RedisConfig {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");
            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            (container, format!("redis://127.0.0.1:{host_port}"))
        })
        .await;

    RedisConfig {
        enabled: true,
        url: url.clone(),
        pool_size: 5,
        timeout_ms: 5000,
        connect_attempts: 3,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_connects_to_redis() {
    let store = connect_cache_store(&redis_config().await).await;
    assert_eq!(store.backend_name(), "redis");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_get_delete() {
    let store = connect_cache_store(&redis_config().await).await;

    store
        .set("it:kv:entry:get:1", b"value".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        store.get("it:kv:entry:get:1").await.unwrap(),
        Some(b"value".to_vec())
    );

    store.delete("it:kv:entry:get:1").await.unwrap();
    store.delete("it:kv:entry:get:1").await.unwrap();
    assert_eq!(store.get("it:kv:entry:get:1").await.unwrap(), None);

    assert!(
        store
            .set("it:kv:entry:get:2", b"v".to_vec(), Duration::ZERO)
            .await
            .is_err()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sub_second_ttl_expires() {
    let store = connect_cache_store(&redis_config().await).await;
    store
        .set("it:ttl:entry:get:1", b"v".to_vec(), Duration::from_millis(200))
        .await
        .unwrap();
    assert!(store.get("it:ttl:entry:get:1").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(store.get("it:ttl:entry:get:1").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_delete_by_pattern_over_scan() {
    let store = connect_cache_store(&redis_config().await).await;
    for i in 0..250 {
        store
            .set(&format!("it:bulk:entry:findById:{i}"), b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
    }
    store
        .set("it:bulk:other:findById:1", b"v".to_vec(), Duration::from_secs(60))
        .await
        .unwrap();

    let pattern = InvalidationPattern::parse("it:bulk:entry:*").unwrap();
    let report = delete_by_pattern(store.as_ref(), &pattern, 50).await.unwrap();
    assert_eq!(report.deleted, 250);
    assert!(report.batches >= 5);
    assert!(!report.degraded);

    let again = delete_by_pattern(store.as_ref(), &pattern, 50).await.unwrap();
    assert_eq!(again.deleted, 0);
    assert!(store.get("it:bulk:other:findById:1").await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_interceptor_over_redis() {
    let store = connect_cache_store(&redis_config().await).await;
    let cache = CacheAside::new(Arc::clone(&store));
    let scope = Arc::new(EntityScope::new("it", "users", "user").unwrap());
    let find = OperationSpec::read(scope.clone(), "findById").unwrap().cacheable();

    let first: Result<String, ()> = cache
        .call(&find, &call_args!["abc123"], || async { Ok("A".to_string()) })
        .await;
    assert_eq!(first.unwrap(), "A");
    let cached: Result<String, ()> = cache
        .call(&find, &call_args!["abc123"], || async { Ok("never".to_string()) })
        .await;
    assert_eq!(cached.unwrap(), "A");

    let update = OperationSpec::write(scope, "update").unwrap();
    let _: Result<bool, ()> = cache.call(&update, &call_args!["abc123"], || async { Ok(true) }).await;
    assert!(store.get("it:users:user:findById:abc123").await.unwrap().is_none());
}
