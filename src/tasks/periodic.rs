//! Periodic Task
//!
//! Runs an arbitrary callback on a fixed interval, independent of any
//! cache. Useful for reloading data that is not looked up by key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

// == Periodic Task ==
/// Handle to a callback running every `period` on the tokio runtime.
///
/// The first run happens one full period after the start. Runs never
/// overlap: the next tick waits for the previous callback. Dropping the
/// handle stops the task.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use refresh_cache::PeriodicTask;
///
/// # async fn demo() -> refresh_cache::Result<()> {
/// let task = PeriodicTask::start(Duration::from_secs(60), || {
///     // reload something
///     Ok(())
/// })?;
/// task.stop();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PeriodicTask {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Starts calling `callback` every `period`.
    ///
    /// The callback may block; it runs on the blocking pool. A failing
    /// callback is logged and the task keeps ticking.
    ///
    /// # Errors
    /// - `CacheError::Configuration` if `period` is zero
    /// - `CacheError::NoRuntime` if called outside a tokio runtime
    pub fn start<F>(period: Duration, callback: F) -> Result<Self>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if period.is_zero() {
            return Err(CacheError::Configuration(
                "periodic task period must be greater than 0".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let callback = Arc::new(callback);

        let handle = runtime.spawn(async move {
            info!(
                "Starting periodic task with interval of {} ms",
                period.as_millis()
            );

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !flag.load(Ordering::Acquire) {
                    break;
                }

                let callback = Arc::clone(&callback);
                match tokio::task::spawn_blocking(move || callback()).await {
                    Ok(Ok(())) => debug!("periodic task ran"),
                    Ok(Err(err)) => warn!(error = %err, "periodic task failed"),
                    Err(err) => warn!(error = %err, "periodic task panicked"),
                }
            }
        });

        Ok(Self { running, handle })
    }

    /// Stops the task. A callback already running is left to finish.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            self.handle.abort();
            info!("periodic task stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(period: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = PeriodicTask::start(period, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        (task, calls)
    }

    #[tokio::test]
    async fn test_periodic_task_runs_each_period() {
        let (task, calls) = counting_task(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(550)).await;
        task.stop();

        let seen = calls.load(Ordering::SeqCst);
        assert!(seen >= 3, "callback ran {} times", seen);
    }

    #[tokio::test]
    async fn test_periodic_task_waits_one_period() {
        let (task, calls) = counting_task(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(task.is_running());
    }

    #[tokio::test]
    async fn test_periodic_task_stop_halts_callbacks() {
        let (task, calls) = counting_task(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        task.stop();
        let seen = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), seen);
        assert!(!task.is_running());
        // Stopping twice is a no-op
        task.stop();
    }

    #[tokio::test]
    async fn test_dropping_periodic_task_stops_it() {
        let (task, calls) = counting_task(Duration::from_millis(100));

        drop(task);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_callback_keeps_ticking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let task = PeriodicTask::start(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("source unavailable"))
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        task.stop();

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let result = PeriodicTask::start(Duration::ZERO, || Ok(()));
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_periodic_task_needs_runtime() {
        let result = PeriodicTask::start(Duration::from_secs(1), || Ok(()));
        assert!(matches!(result, Err(CacheError::NoRuntime)));
    }
}
