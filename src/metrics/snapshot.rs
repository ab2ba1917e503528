/// Point-in-time copy of a cache's counters and gauges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub stale_hits: u64,
    pub get_misses: u64,
    // callers that joined another caller's in-flight load
    pub coalesced_waits: u64,

    pub loads: u64,
    pub load_failures: u64,

    pub refreshes_scheduled: u64,
    pub refresh_failures: u64,

    pub evicted_entries: u64,
    pub expired_entries: u64,
    pub releases: u64,
    pub release_failures: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
}

impl CacheMetricsSnapshot {
    /// Fraction of `get` calls served from a resident entry (fresh or stale).
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            return 0.0;
        }
        (self.get_hits + self.stale_hits) as f64 / self.get_calls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_ratio_counts_stale_hits() {
        let snapshot = CacheMetricsSnapshot {
            get_calls: 4,
            get_hits: 2,
            stale_hits: 1,
            get_misses: 1,
            ..Default::default()
        };
        assert!((snapshot.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn hit_ratio_of_idle_cache_is_zero() {
        assert_eq!(CacheMetricsSnapshot::default().hit_ratio(), 0.0);
    }
}
