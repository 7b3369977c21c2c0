//! Per-cache counters and their snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time statistics for one tiered cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TieredCacheStats {
    /// Cache name
    pub cache: String,
    /// Reads answered by the local tier
    pub local_hits: u64,
    /// Reads answered by the remote tier
    pub remote_hits: u64,
    /// Reads absent from both tiers
    pub misses: u64,
    /// Successful loader runs
    pub loads: u64,
    /// Loader errors and panics
    pub load_failures: u64,
    /// Remote tier calls that failed or timed out
    pub remote_failures: u64,
    /// Tier calls slower than the warning threshold
    pub slow_operations: u64,
    /// Keys with a load currently in progress
    pub in_flight: usize,
    /// Approximate number of entries in the local tier
    pub local_entries: u64,
}

impl TieredCacheStats {
    /// Total reads, hits and misses.
    pub fn lookups(&self) -> u64 {
        self.local_hits + self.remote_hits + self.misses
    }

    /// Fraction of reads served by either tier, `0.0` before the first read.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            return 0.0;
        }
        (self.local_hits + self.remote_hits) as f64 / lookups as f64
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    remote_failures: AtomicU64,
    slow_operations: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_failure(&self) {
        self.remote_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_slow_operation(&self) {
        self.slow_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, cache: &str, in_flight: usize, local_entries: u64) -> TieredCacheStats {
        TieredCacheStats {
            cache: cache.to_string(),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            slow_operations: self.slow_operations.load(Ordering::Relaxed),
            in_flight,
            local_entries,
        }
    }
}
