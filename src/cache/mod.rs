//! Cache Module
//!
//! Expire-after-write caching with optional stale-while-revalidate refresh.

mod entry;
mod expiring;
mod refreshing;
mod stats;

// Re-export public types
pub use entry::CacheEntry;
pub use expiring::ExpiringCache;
pub use refreshing::{RefreshingCache, Refresher};
pub use stats::CacheStats;

pub(crate) use refreshing::RefreshingInner;

// == Cache Trait ==
/// Read/write surface shared by the expiring and refreshing caches.
pub trait Cache<K, T> {
    /// Returns a usable value for `key`, if any.
    fn get(&self, key: &K) -> Option<T>;

    /// Stores `value`, returning the previous value if it was still fresh.
    fn set(&self, key: K, value: T) -> Option<T>;

    /// TTL applied to every write, 0 = never expire.
    fn expire_after_write_secs(&self) -> u64;
}
