//! Memory Pressure Monitor
//!
//! Evicts a fixed number of entries on each tick while memory pressure stays
//! above the configured threshold.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::engine::CacheEngine;

pub fn spawn_pressure_monitor(
    engine: Arc<CacheEngine>,
    check_interval_secs: u64,
    threshold: f64,
    evict_count: usize,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(check_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting memory pressure monitor: threshold={:.2}, interval={}s",
            threshold,
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;
            engine.relieve_memory_pressure(threshold, evict_count).await;
        }
    })
}
