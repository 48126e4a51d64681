//! Expiring Cache Module
//!
//! Thread-safe keyed store where each entry expires a fixed time after it
//! was written. Expired entries are invisible to `get`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::cache::stats::StatsCounters;
use crate::cache::{Cache, CacheEntry, CacheStats};
use crate::clock::{Clock, SystemClock};
use crate::config::validate_secs;
use crate::error::Result;

// == Expiring Cache ==
/// Keyed store with expire-after-write semantics.
///
/// All entries share one TTL. A single coarse lock guards the map.
pub struct ExpiringCache<K, T> {
    /// Key-value storage
    entries: Mutex<HashMap<K, CacheEntry<T>>>,
    /// TTL applied to every write, 0 = never expire
    expire_after_write_secs: u64,
    /// Time source for write stamps and freshness checks
    clock: Arc<dyn Clock>,
    /// Lookup and refresh counters
    stats: StatsCounters,
}

impl<K, T> ExpiringCache<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone,
{
    // == Constructor ==
    /// Creates a cache whose entries expire `expire_after_write_secs` after being set.
    ///
    /// # Errors
    /// `CacheError::Configuration` if `expire_after_write_secs` is negative.
    pub fn new(expire_after_write_secs: i64) -> Result<Self> {
        Self::with_clock(expire_after_write_secs, Arc::new(SystemClock))
    }

    /// Same as [`ExpiringCache::new`] with an explicit time source.
    pub fn with_clock(expire_after_write_secs: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        let expire_after_write_secs = validate_secs("expire_after_write", expire_after_write_secs)?;
        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            expire_after_write_secs,
            clock,
            stats: StatsCounters::default(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    /// Retrieves a fresh value by key.
    ///
    /// Returns None when the key is absent or its entry has expired.
    pub fn get(&self, key: &K) -> Option<T> {
        let now = self.clock.now_ms();
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!(?key, "cache entry expired");
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value stamped with the current time, replacing any entry.
    ///
    /// # Returns
    /// The previous value if it was still fresh.
    pub fn set(&self, key: K, value: T) -> Option<T> {
        let now = self.clock.now_ms();
        let entry = CacheEntry::new(value, now, self.expire_after_write_secs);
        let previous = self.lock().insert(key, entry)?;
        previous.is_fresh(now).then_some(previous.value)
    }

    // == Remove ==
    /// Removes an entry, returning its value whether fresh or not.
    pub fn remove(&self, key: &K) -> Option<T> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of stored entries, fresh or expired.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the stored keys.
    pub fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    pub fn expire_after_write_secs(&self) -> u64 {
        self.expire_after_write_secs
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    // == Crate Internals ==
    /// Returns a copy of the raw entry, fresh or not, without touching stats.
    pub(crate) fn peek_entry(&self, key: &K) -> Option<CacheEntry<T>> {
        self.lock().get(key).cloned()
    }

    /// Stores `value` unless the entry was written after `since_ms`.
    ///
    /// # Returns
    /// `false` if a newer write was kept instead.
    pub(crate) fn set_unless_newer(&self, key: K, value: T, since_ms: i64) -> bool {
        let now = self.clock.now_ms();
        let mut entries = self.lock();
        if entries.get(&key).is_some_and(|entry| entry.write_time_ms > since_ms) {
            return false;
        }
        entries.insert(key, CacheEntry::new(value, now, self.expire_after_write_secs));
        true
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub(crate) fn counters(&self) -> &StatsCounters {
        &self.stats
    }
}

impl<K, T> Cache<K, T> for ExpiringCache<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug,
    T: Clone,
{
    fn get(&self, key: &K) -> Option<T> {
        ExpiringCache::get(self, key)
    }

    fn set(&self, key: K, value: T) -> Option<T> {
        ExpiringCache::set(self, key, value)
    }

    fn expire_after_write_secs(&self) -> u64 {
        self.expire_after_write_secs
    }
}

impl<K, T> fmt::Debug for ExpiringCache<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.lock().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("ExpiringCache")
            .field("expire_after_write_secs", &self.expire_after_write_secs)
            .field("entries", &len)
            .finish()
    }
}
