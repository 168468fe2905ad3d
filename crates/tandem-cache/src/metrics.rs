//! Cache counters reported through the `metrics` facade.
//!
//! Nothing is exported unless the embedding application installs a recorder.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_SETS_TOTAL: &str = "cache_sets_total";
    pub const CACHE_INVALIDATED_KEYS_TOTAL: &str = "cache_invalidated_keys_total";
    pub const CACHE_FAILURES_TOTAL: &str = "cache_failures_total";
}

pub fn record_cache_hit(scope: &str) {
    counter!(names::CACHE_HITS_TOTAL, "scope" => scope.to_string()).increment(1);
}

pub fn record_cache_miss(scope: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "scope" => scope.to_string()).increment(1);
}

pub fn record_cache_set(scope: &str) {
    counter!(names::CACHE_SETS_TOTAL, "scope" => scope.to_string()).increment(1);
}

pub fn record_invalidated_keys(count: usize) {
    counter!(names::CACHE_INVALIDATED_KEYS_TOTAL).increment(count as u64);
}

/// `stage` is one of `get`, `set`, `decode`, `invalidate`.
pub fn record_cache_failure(stage: &'static str) {
    counter!(names::CACHE_FAILURES_TOTAL, "stage" => stage).increment(1);
}
