//! Refresh Cache - an in-process expiring cache with background refresh
//!
//! Provides expire-after-write caching, stale-while-revalidate refresh
//! with per-key refreshers, call memoization, and two indexing structures
//! (a bijective map and a row/column table).

pub mod cache;
pub mod clock;
pub mod collections;
pub mod config;
pub mod error;
pub mod memo;
pub mod storage;
mod tasks;

pub use cache::{Cache, CacheStats, ExpiringCache, RefreshingCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collections::{BiMap, Table};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memo::{Fingerprint, Memoizer};
pub use storage::{KeyValueStore, MemoryStore};
pub use tasks::PeriodicTask;
