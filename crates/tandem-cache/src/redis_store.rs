//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use crate::error::CacheResult;
use crate::store::{CacheStore, require_ttl};

/// Cache store on a shared Redis server, reached through a connection pool.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Checks out a connection and issues `PING`.
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn conn(&self) -> CacheResult<Connection> {
        Ok(self.pool.get().await?)
    }
}

/// Redis expiries are whole seconds; partial seconds round up.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        require_ttl(key, ttl)?;
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.conn().await?;
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok((next, keys))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.keys::<_, Vec<String>>(pattern).await?)
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del::<_, usize>(keys).await?)
    }

    async fn len(&self) -> CacheResult<usize> {
        let mut conn = self.conn().await?;
        let size: usize = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(size)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
