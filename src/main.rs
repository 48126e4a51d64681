//! Refresh Cache demo runner
//!
//! Memoizes a slow lookup backed by a key/value store, keeps it fresh with
//! auto refresh, and logs what readers observe until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refresh_cache::{CacheConfig, KeyValueStore, Memoizer, MemoryStore, PeriodicTask};

/// Seconds between demo reads.
const READ_INTERVAL: Duration = Duration::from_secs(1);

/// Seconds between changes to the store of record.
const BUMP_INTERVAL: Duration = Duration::from_secs(2);

/// Main entry point for the demo runner.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Seed the store of record and create the memoizer
/// 4. Start auto refresh and a periodic writer moving the stored rate
/// 5. Read the memoized value every second until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refresh_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting refresh cache demo");

    let config = CacheConfig::from_env().context("loading cache configuration")?;
    info!(
        "Configuration loaded: expire_after_write={}s, refresh_interval={}s, refresh_timeout={}s",
        config.expire_after_write_secs, config.refresh_interval_secs, config.refresh_timeout_secs
    );

    let store = Arc::new(MemoryStore::new());
    store.save_json("rate:EUR", &1.0_f64)?;

    let memo: Memoizer<f64> = Memoizer::new(&config)?;
    memo.cache().start_auto_refresh()?;

    let writer = Arc::clone(&store);
    let bumper = PeriodicTask::start(BUMP_INTERVAL, move || bump_rate(&writer))?;

    let mut ticker = tokio::time::interval(READ_INTERVAL);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let reader = Arc::clone(&store);
                // A miss computes on this thread
                let rate = tokio::task::block_in_place(|| {
                    memo.invoke("RateService", "rate", &["EUR"], move || {
                        std::thread::sleep(Duration::from_millis(200));
                        reader
                            .load_json::<f64>("rate:EUR")?
                            .context("rate:EUR missing from store")
                    })
                })?;
                let stats = memo.stats();
                info!(
                    rate,
                    hits = stats.hits,
                    stale_hits = stats.stale_hits,
                    refreshes = stats.refreshes,
                    "read memoized rate"
                );
            }
        }
    }

    bumper.stop();
    memo.cache().stop_auto_refresh();
    info!("Demo shutdown complete");
    Ok(())
}

/// Moves the stored rate so refreshes have something new to pick up.
fn bump_rate(store: &MemoryStore) -> anyhow::Result<()> {
    let current: f64 = store.load_json("rate:EUR")?.unwrap_or(1.0);
    store.save_json("rate:EUR", &(current + 0.01))?;
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
