//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

// == Cache Entry ==
/// Represents a single cache entry with value and write metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Write timestamp (Unix milliseconds)
    pub write_time_ms: i64,
    /// Time to live in seconds, 0 = never expires
    pub ttl_secs: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new cache entry written at `now_ms`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `now_ms` - Write time in Unix milliseconds
    /// * `ttl_secs` - TTL in seconds, 0 for no expiration
    pub fn new(value: T, now_ms: i64, ttl_secs: u64) -> Self {
        Self {
            value,
            write_time_ms: now_ms,
            ttl_secs,
        }
    }

    // == Expiry ==
    /// Returns the expiration timestamp, or None if the entry never expires.
    pub fn expires_at_ms(&self) -> Option<i64> {
        if self.ttl_secs == 0 {
            return None;
        }
        let ttl_ms = i64::try_from(self.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Some(self.write_time_ms.saturating_add(ttl_ms))
    }

    // == Is Fresh ==
    /// Freshness predicate: `ttl == 0 || now < write_time + ttl`.
    ///
    /// An entry is already stale at the exact instant its TTL elapses.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        match self.expires_at_ms() {
            Some(expires) => now_ms < expires,
            None => true,
        }
    }

    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry is stale
    /// - `Some(remaining_ms)` while fresh
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self, now_ms: i64) -> Option<u64> {
        self.expires_at_ms()
            .map(|expires| u64::try_from(expires.saturating_sub(now_ms)).unwrap_or(0))
    }
}
