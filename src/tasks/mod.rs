//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Auto refresh: refreshes every key of a refreshing cache at a fixed interval
//! - Periodic task: runs any callback at a fixed interval

mod periodic;
mod refresh;

pub use periodic::PeriodicTask;
pub(crate) use refresh::{spawn_refresh_task, AutoRefreshTask};
