//! Cache Statistics Module
//!
//! Tracks cache lookup and refresh counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups answered with a fresh value
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Lookups answered with a stale value while a refresh was triggered
    pub stale_hits: u64,
    /// Refreshes that stored a new value
    pub refreshes: u64,
    /// Refreshes whose refresher failed or timed out
    pub refresh_failures: u64,
    /// Current number of entries in the cache, fresh or stale
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the share of lookups answered with any value.
    ///
    /// Returns (hits + stale_hits) / lookups, or 0.0 if no lookups happened.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters shared by the cache and its refresh tasks.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_hit(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot with the given entry count.
    pub(crate) fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.stale_hits, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_stale_hits_as_served() {
        let counters = StatsCounters::default();
        counters.record_hit();
        counters.record_stale_hit();
        counters.record_miss();
        counters.record_miss();

        assert_eq!(counters.snapshot(0).hit_rate(), 0.5);
    }

    #[test]
    fn test_snapshot_reports_all_counters() {
        let counters = StatsCounters::default();
        counters.record_refresh();
        counters.record_refresh();
        counters.record_refresh_failure();

        let stats = counters.snapshot(42);
        assert_eq!(stats.refreshes, 2);
        assert_eq!(stats.refresh_failures, 1);
        assert_eq!(stats.total_entries, 42);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_value(StatsCounters::default().snapshot(3)).unwrap();
        assert_eq!(json["total_entries"], 3);
        assert_eq!(json["stale_hits"], 0);
    }
}
