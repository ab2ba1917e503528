//! Cache counters.
//!
//! Every counter is a relaxed `AtomicU64`. None of them feeds back into cache
//! decisions.

pub mod snapshot;

use std::sync::atomic::{AtomicU64, Ordering};

pub use snapshot::CacheMetricsSnapshot;

#[derive(Debug, Default)]
pub struct CacheMetrics {
    get_calls: AtomicU64,
    get_hits: AtomicU64,
    stale_hits: AtomicU64,
    get_misses: AtomicU64,
    coalesced_waits: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    refreshes_scheduled: AtomicU64,
    refresh_failures: AtomicU64,
    evicted_entries: AtomicU64,
    expired_entries: AtomicU64,
    releases: AtomicU64,
    release_failures: AtomicU64,
}

#[inline]
fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_get_call(&self) {
        incr(&self.get_calls);
    }

    pub(crate) fn record_hit(&self) {
        incr(&self.get_hits);
    }

    pub(crate) fn record_stale_hit(&self) {
        incr(&self.stale_hits);
    }

    pub(crate) fn record_miss(&self) {
        incr(&self.get_misses);
    }

    pub(crate) fn record_coalesced_wait(&self) {
        incr(&self.coalesced_waits);
    }

    pub(crate) fn record_load(&self) {
        incr(&self.loads);
    }

    pub(crate) fn record_load_failure(&self) {
        incr(&self.load_failures);
    }

    pub(crate) fn record_refresh_scheduled(&self) {
        incr(&self.refreshes_scheduled);
    }

    pub(crate) fn record_refresh_failure(&self) {
        incr(&self.refresh_failures);
    }

    pub(crate) fn record_eviction(&self) {
        incr(&self.evicted_entries);
    }

    pub(crate) fn record_expiry(&self) {
        incr(&self.expired_entries);
    }

    pub(crate) fn record_release(&self) {
        incr(&self.releases);
    }

    pub(crate) fn record_release_failure(&self) {
        incr(&self.release_failures);
    }

    /// Copies the counters; `cache_len` and `capacity` are filled by the cache.
    pub fn snapshot(&self, cache_len: usize, capacity: usize) -> CacheMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheMetricsSnapshot {
            get_calls: load(&self.get_calls),
            get_hits: load(&self.get_hits),
            stale_hits: load(&self.stale_hits),
            get_misses: load(&self.get_misses),
            coalesced_waits: load(&self.coalesced_waits),
            loads: load(&self.loads),
            load_failures: load(&self.load_failures),
            refreshes_scheduled: load(&self.refreshes_scheduled),
            refresh_failures: load(&self.refresh_failures),
            evicted_entries: load(&self.evicted_entries),
            expired_entries: load(&self.expired_entries),
            releases: load(&self.releases),
            release_failures: load(&self.release_failures),
            cache_len,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_records() {
        let metrics = CacheMetrics::new();
        metrics.record_get_call();
        metrics.record_get_call();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_load();
        metrics.record_release_failure();

        let snapshot = metrics.snapshot(3, 10);
        assert_eq!(snapshot.get_calls, 2);
        assert_eq!(snapshot.get_hits, 1);
        assert_eq!(snapshot.get_misses, 1);
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.release_failures, 1);
        assert_eq!(snapshot.cache_len, 3);
        assert_eq!(snapshot.capacity, 10);
    }
}
