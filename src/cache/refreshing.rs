//! Refreshing Cache Module
//!
//! Expiring cache with per-key refreshers. Stale reads are served
//! immediately while the key is refreshed in the background
//! (stale-while-revalidate), and a background task can refresh every key
//! on a fixed period.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheStats, ExpiringCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_refresh_task, AutoRefreshTask};

/// Function recomputing the value of one key. May block.
pub type Refresher<K, T> = Arc<dyn Fn(&K) -> anyhow::Result<T> + Send + Sync>;

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Refreshing Cache ==
/// Cloneable handle to a cache that revalidates stale entries.
///
/// Clones share the same entries, refreshers and auto-refresh task.
/// Dropping the last handle stops the auto-refresh task.
///
/// # Example
/// ```no_run
/// use refresh_cache::{CacheConfig, RefreshingCache};
///
/// # async fn demo() -> refresh_cache::error::Result<()> {
/// let config = CacheConfig::default().with_expire_after_write(30);
/// let cache = RefreshingCache::new(&config)?;
///
/// cache.set_with_refresher("rate", 1.0_f64, |_| Ok(1.1));
/// cache.start_auto_refresh()?;
/// let rate = cache.get(&"rate");
/// # Ok(())
/// # }
/// ```
pub struct RefreshingCache<K, T> {
    inner: Arc<RefreshingInner<K, T>>,
}

impl<K, T> Clone for RefreshingCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Shared state behind every [`RefreshingCache`] handle.
pub(crate) struct RefreshingInner<K, T> {
    base: ExpiringCache<K, T>,
    refreshers: Mutex<HashMap<K, Refresher<K, T>>>,
    /// Keys with an asynchronous refresh still running
    in_flight: Mutex<HashSet<K>>,
    config: CacheConfig,
    /// Runtime used for asynchronous refreshes, if one was available
    runtime: Option<Handle>,
    auto_refresh: Mutex<Option<AutoRefreshTask>>,
}

impl<K, T> RefreshingCache<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache from a validated configuration.
    ///
    /// Captures the current tokio runtime, if any, for background refreshes.
    ///
    /// # Errors
    /// `CacheError::Configuration` if any configured duration is negative.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`RefreshingCache::new`] with an explicit time source.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::build(config, clock, Handle::try_current().ok())
    }

    /// Creates a cache that runs its background refreshes on `runtime`.
    pub fn with_runtime(config: &CacheConfig, clock: Arc<dyn Clock>, runtime: Handle) -> Result<Self> {
        Self::build(config, clock, Some(runtime))
    }

    fn build(config: &CacheConfig, clock: Arc<dyn Clock>, runtime: Option<Handle>) -> Result<Self> {
        config.validate()?;
        let base = ExpiringCache::with_clock(config.expire_after_write_secs, clock)?;
        Ok(Self {
            inner: Arc::new(RefreshingInner {
                base,
                refreshers: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                config: config.clone(),
                runtime,
                auto_refresh: Mutex::new(None),
            }),
        })
    }

    // == Refreshers ==
    /// Registers or replaces the refresher for `key` without running it.
    pub fn set_refresher<F>(&self, key: K, refresher: F)
    where
        F: Fn(&K) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        lock(&self.inner.refreshers).insert(key, Arc::new(refresher));
    }

    /// Stores `value` and registers its refresher in one call.
    ///
    /// # Returns
    /// The previous value if it was still fresh.
    pub fn set_with_refresher<F>(&self, key: K, value: T, refresher: F) -> Option<T>
    where
        F: Fn(&K) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.set_refresher(key.clone(), refresher);
        self.set(key, value)
    }

    /// Unregisters the refresher for `key`. The cached value is kept.
    pub fn remove_refresher(&self, key: &K) -> bool {
        lock(&self.inner.refreshers).remove(key).is_some()
    }

    pub fn has_refresher(&self, key: &K) -> bool {
        lock(&self.inner.refreshers).contains_key(key)
    }

    /// Snapshot of the keys that have a refresher.
    pub fn refresher_keys(&self) -> Vec<K> {
        self.inner.refresher_keys()
    }

    // == Get ==
    /// Retrieves a value by key, revalidating stale entries.
    ///
    /// - fresh entry: returned as is
    /// - stale entry with a refresher: the stale value is returned at once
    ///   and an asynchronous refresh of the key is dispatched
    /// - absent, or stale with nothing to revalidate it: None
    pub fn get(&self, key: &K) -> Option<T> {
        let base = &self.inner.base;
        let Some(entry) = base.peek_entry(key) else {
            base.counters().record_miss();
            return None;
        };

        if entry.is_fresh(base.now_ms()) {
            base.counters().record_hit();
            return Some(entry.value);
        }

        match self.inner.refresher(key) {
            Some(refresher) => {
                debug!(?key, "serving stale value, refreshing in background");
                base.counters().record_stale_hit();
                self.inner.spawn_refresh(key.clone(), refresher);
                Some(entry.value)
            }
            None => {
                debug!(?key, "stale entry has no refresher");
                base.counters().record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a value stamped with the current time.
    pub fn set(&self, key: K, value: T) -> Option<T> {
        self.inner.base.set(key, value)
    }

    /// Removes the cached value for `key`. Its refresher stays registered.
    pub fn remove(&self, key: &K) -> Option<T> {
        self.inner.base.remove(key)
    }

    // == Refresh ==
    /// Runs the refresher for `key` on the calling thread and stores the result.
    ///
    /// A write to `key` that lands while the refresher runs, including an
    /// asynchronous refresh finishing first, is kept: the refreshed value
    /// is returned but not stored.
    ///
    /// # Errors
    /// - `CacheError::MissingRefresher` if no refresher is registered
    /// - `CacheError::RefresherExecution` if the refresher fails
    pub fn refresh(&self, key: &K) -> Result<T> {
        let refresher = self
            .inner
            .refresher(key)
            .ok_or_else(|| CacheError::missing_refresher(key))?;
        self.inner.run_refresher(key, &refresher)
    }

    /// Refreshes every key that has a refresher, one after the other.
    ///
    /// Every key is attempted even when some fail.
    ///
    /// # Returns
    /// The number of keys refreshed.
    ///
    /// # Errors
    /// `CacheError::PartialRefresh` carrying every individual failure.
    pub fn refresh_all(&self) -> Result<usize> {
        let keys = self.inner.refresher_keys();
        let attempted = keys.len();
        let failures: Vec<CacheError> = keys
            .iter()
            .filter_map(|key| self.refresh(key).err())
            .collect();

        if failures.is_empty() {
            debug!(attempted, "refreshed all keys");
            Ok(attempted)
        } else {
            warn!(attempted, failed = failures.len(), "bulk refresh had failures");
            Err(CacheError::PartialRefresh {
                attempted,
                failures,
            })
        }
    }

    // == Auto Refresh ==
    /// Starts refreshing every key each `refresh_interval_secs`.
    ///
    /// Replaces any running auto-refresh task. Does nothing when the
    /// configured interval is 0.
    ///
    /// # Errors
    /// `CacheError::NoRuntime` if no tokio runtime is available.
    pub fn start_auto_refresh(&self) -> Result<()> {
        let Some(period) = self.inner.config.refresh_interval() else {
            info!("refresh interval is 0, auto refresh disabled");
            return Ok(());
        };
        let runtime = self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(CacheError::NoRuntime)?;

        let mut slot = lock(&self.inner.auto_refresh);
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        *slot = Some(spawn_refresh_task(Arc::downgrade(&self.inner), period, &runtime));
        info!(period_secs = period.as_secs(), "auto refresh started");
        Ok(())
    }

    /// Stops the auto-refresh task.
    ///
    /// Once this returns no further scheduled refresh is dispatched.
    /// Refreshes already running are left to finish.
    pub fn stop_auto_refresh(&self) {
        if self.inner.stop_auto_refresh() {
            info!("auto refresh stopped");
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        lock(&self.inner.auto_refresh).is_some()
    }

    // == Inspection ==
    pub fn len(&self) -> usize {
        self.inner.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.base.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.base.stats()
    }
}

impl<K, T> RefreshingInner<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn refresher(&self, key: &K) -> Option<Refresher<K, T>> {
        lock(&self.refreshers).get(key).cloned()
    }

    fn refresher_keys(&self) -> Vec<K> {
        lock(&self.refreshers).keys().cloned().collect()
    }

    /// Runs `refresher` outside any lock and stores its value.
    fn run_refresher(&self, key: &K, refresher: &Refresher<K, T>) -> Result<T> {
        let started_ms = self.base.now_ms();
        match refresher(key) {
            Ok(value) => {
                self.store_refreshed(key.clone(), value.clone(), started_ms);
                Ok(value)
            }
            Err(err) => {
                self.base.counters().record_refresh_failure();
                warn!(?key, error = %err, "refresher failed");
                Err(CacheError::refresher_failed(key, err))
            }
        }
    }

    /// Stores a refreshed value unless `key` was written after `started_ms`.
    fn store_refreshed(&self, key: K, value: T, started_ms: i64) {
        if self.base.set_unless_newer(key.clone(), value, started_ms) {
            debug!(?key, "refreshed");
            self.base.counters().record_refresh();
        } else {
            debug!(?key, "newer write landed during refresh, refreshed value dropped");
        }
    }

    // == Asynchronous Refresh ==
    /// Dispatches a fire-and-forget refresh of `key`.
    ///
    /// Skipped when a refresh of the same key is still running. The
    /// refresher runs on the blocking pool of the cache's runtime, or of
    /// the caller's runtime; with a refresh timeout configured, a late
    /// result is discarded. Only without any runtime does it fall back to
    /// a plain thread, where no timeout applies.
    fn spawn_refresh(self: &Arc<Self>, key: K, refresher: Refresher<K, T>) {
        if !lock(&self.in_flight).insert(key.clone()) {
            debug!(?key, "refresh already in flight");
            return;
        }
        let guard = InFlightGuard {
            inner: Arc::clone(self),
            key,
        };

        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
        let Some(runtime) = runtime else {
            std::thread::spawn(move || {
                // Failures are logged and counted by run_refresher
                let _ = guard.inner.run_refresher(&guard.key, &refresher);
            });
            return;
        };

        let inner = Arc::clone(self);
        let timeout = self.config.refresh_timeout();
        let started_ms = self.base.now_ms();
        runtime.spawn(async move {
            let key = guard.key.clone();
            let work = tokio::task::spawn_blocking(move || {
                let guard = guard;
                refresher(&guard.key)
            });

            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        inner.base.counters().record_refresh_failure();
                        warn!(?key, ?limit, "refresh timed out, result will be discarded");
                        return;
                    }
                },
                None => work.await,
            };

            match joined {
                Ok(Ok(value)) => inner.store_refreshed(key, value, started_ms),
                Ok(Err(err)) => {
                    inner.base.counters().record_refresh_failure();
                    warn!(?key, error = %err, "background refresh failed");
                }
                Err(err) => {
                    inner.base.counters().record_refresh_failure();
                    warn!(?key, error = %err, "background refresh panicked");
                }
            }
        });
    }

    /// Runs one scheduled tick: dispatches a refresh for every key.
    ///
    /// Holds the auto-refresh slot while checking `running` and
    /// dispatching, so a concurrent stop either happens before the check
    /// or after the whole tick was dispatched.
    ///
    /// # Returns
    /// The number of keys dispatched, or None if the task was stopped.
    pub(crate) fn dispatch_scheduled_refresh(self: &Arc<Self>, running: &AtomicBool) -> Option<usize> {
        let _slot = lock(&self.auto_refresh);
        if !running.load(Ordering::Acquire) {
            return None;
        }

        let refreshers: Vec<(K, Refresher<K, T>)> = lock(&self.refreshers)
            .iter()
            .map(|(key, refresher)| (key.clone(), Arc::clone(refresher)))
            .collect();
        let dispatched = refreshers.len();
        for (key, refresher) in refreshers {
            self.spawn_refresh(key, refresher);
        }
        Some(dispatched)
    }
}

impl<K, T> RefreshingInner<K, T> {
    /// Stops the auto-refresh task, returning whether one was running.
    fn stop_auto_refresh(&self) -> bool {
        let mut slot = lock(&self.auto_refresh);
        match slot.take() {
            Some(task) => {
                task.stop();
                true
            }
            None => false,
        }
    }
}

impl<K, T> Drop for RefreshingInner<K, T> {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

// == In-Flight Guard ==
/// Clears a key's in-flight mark when its refresh finishes, even on panic.
struct InFlightGuard<K: Eq + Hash, T> {
    inner: Arc<RefreshingInner<K, T>>,
    key: K,
}

impl<K: Eq + Hash, T> Drop for InFlightGuard<K, T> {
    fn drop(&mut self) {
        lock(&self.inner.in_flight).remove(&self.key);
    }
}

impl<K, T> Cache<K, T> for RefreshingCache<K, T>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<T> {
        RefreshingCache::get(self, key)
    }

    fn set(&self, key: K, value: T) -> Option<T> {
        RefreshingCache::set(self, key, value)
    }

    fn expire_after_write_secs(&self) -> u64 {
        self.inner.base.expire_after_write_secs()
    }
}

impl<K, T> fmt::Debug for RefreshingCache<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshingCache")
            .field("base", &self.inner.base)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
