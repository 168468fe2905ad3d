//! In-process cache store.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tandem_core::PatternMatcher;
use tokio::time::Instant;

use crate::error::{CacheError, CacheResult};
use crate::store::{CacheStore, require_ttl};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Open scan cursors kept per store; registering one more drops them all.
const MAX_OPEN_CURSORS: usize = 1024;

/// Cache store backed by an ordered map.
///
/// Expired entries are evicted lazily when read and skipped by scans. A scan
/// cursor resumes after the last key of the previous page, so keys deleted
/// while an iteration is in flight never make a later page skip entries.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    cursors: Mutex<HashMap<u64, String>>,
    next_cursor: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Remaining lifetime of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }

    fn open_cursor(&self, resume_after: String) -> u64 {
        let id = self.next_cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1).max(1);
        let mut cursors = self.cursors.lock();
        if cursors.len() >= MAX_OPEN_CURSORS {
            tracing::debug!(open = cursors.len(), "dropping abandoned scan cursors");
            cursors.clear();
        }
        cursors.insert(id, resume_after);
        id
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            tracing::trace!(key = %key, "expired cache entry evicted");
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        require_ttl(key, ttl)?;
        let entry = Entry {
            data: value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let matcher = PatternMatcher::compile(pattern)?;
        let resume_after = match cursor {
            0 => None,
            id => Some(
                self.cursors
                    .lock()
                    .remove(&id)
                    .ok_or_else(|| CacheError::backend(format!("unknown scan cursor {id}")))?,
            ),
        };

        let now = Instant::now();
        let entries = self.entries.read();
        let lower = match &resume_after {
            Some(last) => Bound::Excluded(last.as_str()),
            None => Bound::Unbounded,
        };
        let mut range = entries.range::<str, _>((lower, Bound::Unbounded));

        let mut last_visited = None;
        let mut keys = Vec::new();
        for (key, entry) in range.by_ref().take(count.max(1)) {
            last_visited = Some(key);
            if !entry.is_expired(now) && matcher.matches(key) {
                keys.push(key.clone());
            }
        }

        let next = match last_visited {
            Some(last) if range.next().is_some() => self.open_cursor(last.clone()),
            _ => 0,
        };
        Ok((next, keys))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let matcher = PatternMatcher::compile(pattern)?;
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && matcher.matches(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let removed = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| !entry.is_expired(now))
            .count();
        Ok(removed)
    }

    async fn len(&self) -> CacheResult<usize> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
