use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tandem_cache::{CacheStore, connect_cache_store};
use tandem_db_postgres::{create_pool, redact_url, server_version};

use crate::config::{AppConfig, SecondaryBackend};
use crate::output::{print_failure, print_field, print_success};

const PROBE_TTL: Duration = Duration::from_secs(30);

/// Writes, reads back and deletes a probe key.
async fn probe_cache(store: &Arc<dyn CacheStore>) -> Result<()> {
    let key = format!("tandem:check:probe:{}", uuid::Uuid::new_v4());
    store.set(&key, b"ok".to_vec(), PROBE_TTL).await?;
    let read = store.get(&key).await?;
    store.delete(&key).await?;
    if read.as_deref() != Some(b"ok".as_slice()) {
        bail!("probe key did not round-trip");
    }
    Ok(())
}

pub async fn run(config: &AppConfig) -> Result<()> {
    let mut healthy = true;

    let store = connect_cache_store(&config.redis).await;
    let backend = store.backend_name();
    if config.redis.enabled && backend != "redis" {
        print_failure(&format!(
            "cache: redis unreachable at {}, fell back to {backend}",
            redact_url(&config.redis.url)
        ));
        healthy = false;
    }
    match probe_cache(&store).await {
        Ok(()) => print_success(&format!("cache: {backend} store answers")),
        Err(e) => {
            print_failure(&format!("cache: {backend} probe failed: {e}"));
            healthy = false;
        }
    }
    if let Ok(len) = store.len().await {
        print_field("cache keys", len);
    }

    match config.stores.secondary_backend {
        SecondaryBackend::Memory => print_success("secondary: in-memory store"),
        SecondaryBackend::Postgres => {
            let url = redact_url(&config.postgres.url);
            let probe = async {
                let pool = create_pool(&config.postgres).await?;
                server_version(&pool).await
            };
            match probe.await {
                Ok(version) => {
                    print_success(&format!("secondary: postgres {version} at {url} answers"))
                }
                Err(e) => {
                    print_failure(&format!("secondary: postgres at {url} failed: {e}"));
                    healthy = false;
                }
            }
        }
    }

    if !healthy {
        bail!("one or more backends are unhealthy");
    }
    Ok(())
}
