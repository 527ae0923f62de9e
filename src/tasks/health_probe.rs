//! Health Probe Task
//!
//! Periodically runs the engine's liveness probe so a degraded engine returns
//! to ready without waiting for a caller to ask.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{CacheEngine, HealthStatus};

pub fn spawn_health_probe(engine: Arc<CacheEngine>, probe_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(probe_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting health probe task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let report = engine.health_check().await;
            if report.status == HealthStatus::Degraded {
                debug!("Health probe: durable backend still unreachable");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::durable::MemoryStore;

    #[tokio::test]
    async fn test_probe_recovers_degraded_engine() {
        let store = Arc::new(MemoryStore::default());
        store.set_available(false);
        let config = Config {
            durable_timeout_ms: 200,
            ..Config::default()
        };
        let engine = Arc::new(CacheEngine::with_durable(&config, store.clone()).await);
        assert!(engine.get_stats().await.durable.is_none());

        store.set_available(true);
        let handle = spawn_health_probe(engine.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(engine.get_stats().await.durable.is_some());
        handle.abort();
    }
}
