//! Auto Refresh Task
//!
//! Background task that periodically refreshes every key of a
//! [`RefreshingCache`](crate::RefreshingCache) that has a refresher.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::RefreshingInner;

// == Auto Refresh Task ==
/// Handle to a running auto-refresh task.
#[derive(Debug)]
pub(crate) struct AutoRefreshTask {
    /// Cleared on stop; checked before every tick is dispatched
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl AutoRefreshTask {
    /// Stops the task. Must be called while holding the cache's
    /// auto-refresh slot so it cannot interleave with a tick.
    pub(crate) fn stop(self) {
        self.running.store(false, Ordering::Release);
        self.handle.abort();
    }
}

/// Spawns a task that dispatches a refresh of every key each `period`.
///
/// The first refresh happens one full period after the start. The task
/// only holds a weak reference to the cache and exits once the cache is
/// dropped. Each key is refreshed as its own background job, so a slow
/// refresher only delays its own key.
///
/// # Arguments
/// * `cache` - Weak reference to the cache state
/// * `period` - Time between ticks
/// * `runtime` - Runtime to spawn the task on
pub(crate) fn spawn_refresh_task<K, T>(
    cache: Weak<RefreshingInner<K, T>>,
    period: Duration,
    runtime: &Handle,
) -> AutoRefreshTask
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let handle = runtime.spawn(async move {
        info!(
            "Starting auto refresh task with interval of {} ms",
            period.as_millis()
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(inner) = cache.upgrade() else {
                debug!("cache dropped, auto refresh task exiting");
                break;
            };
            match inner.dispatch_scheduled_refresh(&flag) {
                Some(dispatched) => debug!(dispatched, "auto refresh tick"),
                None => break,
            }
        }
    });

    AutoRefreshTask { running, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheConfig, RefreshingCache};
    use std::sync::atomic::AtomicUsize;

    fn counting_cache(interval: i64) -> (RefreshingCache<&'static str, usize>, Arc<AtomicUsize>) {
        let config = CacheConfig::default()
            .with_expire_after_write(60)
            .with_refresh_interval(interval);
        let cache = RefreshingCache::new(&config).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        cache.set_refresher("tick", move |_| Ok(counter.fetch_add(1, Ordering::SeqCst) + 1));
        (cache, calls)
    }

    #[tokio::test]
    async fn test_refresh_task_refreshes_each_period() {
        let (cache, calls) = counting_cache(1);

        cache.start_auto_refresh().unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        cache.stop_auto_refresh();

        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(cache.get(&"tick"), Some(calls.load(Ordering::SeqCst)));
    }

    #[tokio::test]
    async fn test_refresh_task_waits_one_period_before_first_tick() {
        let (cache, calls) = counting_cache(1);

        cache.start_auto_refresh().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        cache.stop_auto_refresh();
    }

    #[tokio::test]
    async fn test_refresh_task_exits_when_cache_dropped() {
        let (cache, calls) = counting_cache(1);
        cache.start_auto_refresh().unwrap();

        drop(cache);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_task_exits_without_cache() {
        let task = spawn_refresh_task(
            Weak::<RefreshingInner<u8, u8>>::new(),
            Duration::from_millis(50),
            &Handle::current(),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(task.handle.is_finished(), "Task should exit once the cache is gone");
    }

    #[tokio::test]
    async fn test_refresh_task_can_be_stopped() {
        let task = spawn_refresh_task(
            Weak::<RefreshingInner<u8, u8>>::new(),
            Duration::from_secs(1),
            &Handle::current(),
        );
        let AutoRefreshTask { running, handle } = task;
        running.store(false, Ordering::Release);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after stop");
    }
}
