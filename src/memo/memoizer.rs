//! Memoizer
//!
//! Serves repeated calls from a refreshing cache keyed by call fingerprint.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheStats, RefreshingCache};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::memo::{identity_of, Fingerprint};

// == Memoizer ==
/// Memoizes computations on an owned [`RefreshingCache`].
///
/// The computation behind each cached call is kept as that key's
/// refresher, so stale reads and auto refresh re-run the original call.
/// Entries are never evicted: every distinct call keeps its slot.
///
/// # Example
/// ```no_run
/// use refresh_cache::{CacheConfig, Memoizer};
///
/// # fn demo() -> refresh_cache::error::Result<()> {
/// let memo: Memoizer<u64> = Memoizer::new(&CacheConfig::default())?;
/// let user_id = 42;
/// let score = memo.invoke("ScoreService", "score", &[user_id], move || Ok(user_id * 2))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Memoizer<T> {
    cache: RefreshingCache<Fingerprint, T>,
}

impl<T> Memoizer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            cache: RefreshingCache::with_clock(config, clock)?,
        })
    }

    /// Wraps an existing cache.
    pub fn from_cache(cache: RefreshingCache<Fingerprint, T>) -> Self {
        Self { cache }
    }

    // == Invoke ==
    /// Returns the memoized result of `operation(args)` on `identity`.
    ///
    /// On a miss `compute` runs on the calling thread, its result is cached
    /// and `compute` becomes the refresher for this call. A failed
    /// computation is returned and nothing is cached.
    ///
    /// # Errors
    /// - `CacheError::Serialization` if `args` cannot be serialized
    /// - `CacheError::RefresherExecution` if `compute` fails
    pub fn invoke<A, F>(&self, identity: &str, operation: &str, args: &A, compute: F) -> Result<T>
    where
        A: Serialize + ?Sized,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let fingerprint = Fingerprint::new(identity, operation, args)?;
        if let Some(value) = self.cache.get(&fingerprint) {
            debug!(%fingerprint, "memoized call hit");
            return Ok(value);
        }

        debug!(%fingerprint, "memoized call miss");
        let value = compute().map_err(|err| CacheError::refresher_failed(&fingerprint, err))?;
        self.cache
            .set_with_refresher(fingerprint, value.clone(), move |_| compute());
        Ok(value)
    }

    /// Same as [`Memoizer::invoke`] with the identity taken from `S`'s type name.
    pub fn invoke_for<S, A, F>(&self, operation: &str, args: &A, compute: F) -> Result<T>
    where
        S: ?Sized,
        A: Serialize + ?Sized,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.invoke(identity_of::<S>(), operation, args, compute)
    }

    // == Accessors ==
    /// The underlying cache, e.g. to start auto refresh.
    pub fn cache(&self) -> &RefreshingCache<Fingerprint, T> {
        &self.cache
    }

    /// Number of memoized calls.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (calls.clone(), calls)
    }

    #[test]
    fn test_repeated_call_is_served_from_cache() {
        let memo: Memoizer<usize> = Memoizer::new(&CacheConfig::default()).unwrap();
        let (calls, seen) = counter();

        for _ in 0..3 {
            let calls = calls.clone();
            let value = memo
                .invoke("Repo", "count", &["users"], move || {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 10)
                })
                .unwrap();
            assert_eq!(value, 10);
        }

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_distinct_arguments_get_distinct_slots() {
        let memo: Memoizer<i64> = Memoizer::new(&CacheConfig::default()).unwrap();

        let a = memo.invoke("Math", "double", &[2], || Ok(4)).unwrap();
        let b = memo.invoke("Math", "double", &[3], || Ok(6)).unwrap();

        assert_eq!((a, b), (4, 6));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let memo: Memoizer<i64> = Memoizer::new(&CacheConfig::default()).unwrap();

        let err = memo
            .invoke("Repo", "load", &(), || Err(anyhow::anyhow!("db offline")))
            .unwrap_err();
        assert!(matches!(err, CacheError::RefresherExecution { .. }));
        assert!(memo.is_empty());

        assert_eq!(memo.invoke("Repo", "load", &(), || Ok(1)).unwrap(), 1);
    }

    #[test]
    fn test_compute_is_bound_as_refresher() {
        let memo: Memoizer<usize> = Memoizer::new(&CacheConfig::default()).unwrap();
        let (calls, seen) = counter();

        memo.invoke("Repo", "count", &[1], move || Ok(calls.fetch_add(1, Ordering::SeqCst)))
            .unwrap();
        assert_eq!(memo.cache().refresh_all().unwrap(), 1);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let again = memo.invoke("Repo", "count", &[1], || Ok(99)).unwrap();
        assert_eq!(again, 1);
    }

    #[test]
    fn test_invoke_for_uses_type_identity() {
        struct UserService;
        struct OrderService;
        let memo: Memoizer<&'static str> = Memoizer::new(&CacheConfig::default()).unwrap();

        let user = memo.invoke_for::<UserService, _, _>("name", &[1], || Ok("user")).unwrap();
        let order = memo.invoke_for::<OrderService, _, _>("name", &[1], || Ok("order")).unwrap();

        assert_eq!((user, order), ("user", "order"));
    }

    #[tokio::test]
    async fn test_stale_memoized_value_is_recomputed() {
        let clock = Arc::new(ManualClock::starting_now());
        let config = CacheConfig::default().with_expire_after_write(1);
        let memo: Memoizer<usize> = Memoizer::with_clock(&config, clock.clone()).unwrap();
        let (calls, seen) = counter();

        let first = memo
            .invoke("Repo", "version", &(), move || Ok(calls.fetch_add(1, Ordering::SeqCst)))
            .unwrap();
        assert_eq!(first, 0);

        clock.advance(chrono::Duration::seconds(2));
        let stale = memo.invoke("Repo", "version", &(), || Ok(99)).unwrap();
        assert_eq!(stale, 0);

        for _ in 0..200 {
            if seen.load(Ordering::SeqCst) == 2 && memo.stats().refreshes == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let fresh = memo.invoke("Repo", "version", &(), || Ok(99)).unwrap();
        assert_eq!(fresh, 1);
    }
}
