//! TTL Cleanup Task
//!
//! Background task that periodically removes expired local store entries.
//! Pinned entries never expire and are left alone.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::LocalStore;

/// Spawns a background task that periodically sweeps expired entries.
///
/// # Arguments
/// * `store` - Shared local store handle
/// * `cleanup_interval_secs` - Interval in seconds between sweeps (minimum 1)
///
/// # Returns
/// A JoinHandle for the spawned task, aborted on engine shutdown.
pub fn spawn_cleanup_task(store: LocalStore, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
