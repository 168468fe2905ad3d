//! # tandem-cache
//!
//! Cache stores and the cache-aside interceptor.
//!
//! ## Stores
//!
//! | Store | Use |
//! |-------|-----|
//! | [`MemoryCacheStore`] | single process, tests, fallback when Redis is unreachable |
//! | [`RedisCacheStore`] | shared cache across instances |
//!
//! Both implement [`CacheStore`]. [`delete_by_pattern`] removes every key
//! matching an anchored pattern with cursor scans and bounded delete batches.
//!
//! ## Interceptor
//!
//! [`CacheAside::call`] wraps one data-access call: cacheable reads go
//! through the store, writes invalidate the patterns the policy derives.

mod bulk;
mod config;
mod connect;
mod error;
mod interceptor;
mod memory;
pub mod metrics;
mod redis_store;
mod store;
mod value;

pub use bulk::{DEFAULT_SCAN_BATCH_SIZE, DeleteReport, delete_by_pattern, matching_keys};
pub use config::{CacheConfig, CacheSettings, RedisConfig};
pub use connect::{connect_cache_store, connect_redis};
pub use error::{CacheError, CacheResult};
pub use interceptor::{CacheAside, CacheStats};
pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use store::CacheStore;
pub use value::{CacheValue, decode, encode};
