use anyhow::{Context, Result, bail};
use tandem_cache::{CacheStore, RedisConfig, connect_redis, delete_by_pattern, matching_keys};
use tandem_core::InvalidationPattern;
use tandem_db_postgres::redact_url;

use crate::cli::FlushArgs;
use crate::config::AppConfig;
use crate::output::{print_field, print_success};

pub async fn run(config: &AppConfig, args: &FlushArgs) -> Result<()> {
    let pattern = InvalidationPattern::parse(&args.pattern).context("invalid pattern")?;
    let store = open_store(&config.redis).await?;
    print_field("backend", store.backend_name());
    let batch_size = args.batch_size.unwrap_or(config.cache.scan_batch_size);

    if args.dry_run {
        let keys = matching_keys(&store, &pattern, batch_size).await?;
        for key in &keys {
            println!("{key}");
        }
        print_field("matching", keys.len());
        return Ok(());
    }

    let report = delete_by_pattern(&store, &pattern, batch_size).await?;
    print_field("matched", report.matched);
    print_field("batches", report.batches);
    if report.degraded {
        print_field("listing", "degraded (full key listing)");
    }
    print_success(&format!("deleted {} keys matching {pattern}", report.deleted));
    Ok(())
}

/// Connects to the shared Redis cache. Unlike the services, `flush` never
/// falls back to an in-memory store: there would be nothing in it to flush.
async fn open_store(config: &RedisConfig) -> Result<impl CacheStore> {
    if !config.enabled {
        bail!("redis is disabled (redis.enabled = false); the in-memory cache is private to each process");
    }
    connect_redis(config)
        .await
        .with_context(|| format!("redis unreachable at {}", redact_url(&config.url)))
}
