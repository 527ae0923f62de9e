//! Reporting, warming and eviction operations of the engine.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{
    ActiveBackend, CacheEngine, DurableStats, EngineStats, HealthReport, HealthStatus, WarmReport,
};
use crate::cache::{select_victims, EvictionCandidate};
use crate::durable::{content_key, CONTENT_PREFIX, PIN_PREFIX};

fn strip_prefix(keys: Vec<String>, prefix: &str) -> Vec<String> {
    keys.into_iter()
        .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
        .collect()
}

impl CacheEngine {
    // == Stats ==
    /// Aggregate counters. The durable section is `None` when unreachable.
    pub async fn get_stats(&self) -> EngineStats {
        let (hits, misses) = self.record_counters();
        let total = hits + misses;
        let durable = self.durable_stats().await;

        EngineStats {
            status: if self.durable.is_available() || !self.durable.is_configured() {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            local: self.local.stats().await,
            durable,
            durable_failures: self.durable.health().failure_count(),
        }
    }

    async fn durable_stats(&self) -> Option<DurableStats> {
        let keys = self
            .durable
            .call("stats", |s| s.keys_matching(CONTENT_PREFIX))
            .await?;
        let pins = self
            .durable
            .call("stats", |s| s.keys_matching(PIN_PREFIX))
            .await?;
        let memory = self.durable.call("stats", |s| s.memory_info()).await?;
        Some(DurableStats {
            keys: keys.len(),
            pinned_keys: pins.len(),
            memory,
        })
    }

    // == Health Check ==
    /// Probes the durable backend and reports which backend is serving.
    ///
    /// A successful probe is what brings a degraded engine back to ready.
    pub async fn health_check(&self) -> HealthReport {
        let (status, backend) = if !self.durable.is_configured() {
            (HealthStatus::Healthy, ActiveBackend::Local)
        } else if self.durable.probe().await {
            (HealthStatus::Healthy, ActiveBackend::Durable)
        } else {
            (HealthStatus::Degraded, ActiveBackend::Local)
        };

        HealthReport {
            status,
            backend,
            degraded_since: match status {
                HealthStatus::Degraded => self.durable.health().degraded_since(),
                HealthStatus::Healthy => None,
            },
            timestamp: Utc::now(),
        }
    }

    // == Warm Cache ==
    /// Issues a `get` for every key, `warm_batch_size` at a time, pausing
    /// between batches to bound load on the upstream source.
    ///
    /// Failing keys are counted and skipped; the run always completes.
    pub async fn warm_cache(self: &Arc<Self>, keys: Vec<String>) -> WarmReport {
        let mut report = WarmReport {
            requested: keys.len(),
            ..WarmReport::default()
        };
        let batch_size = self.settings.warm_batch_size.max(1);

        for (index, batch) in keys.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.warm_batch_delay.is_zero() {
                tokio::time::sleep(self.settings.warm_batch_delay).await;
            }

            let mut set = JoinSet::new();
            for key in batch {
                let engine = Arc::clone(self);
                let key = key.clone();
                set.spawn(async move {
                    let outcome = engine.get(&key).await;
                    (key, outcome)
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((_, Ok(Some(_)))) => report.hits += 1,
                    Ok((_, Ok(None))) => report.misses += 1,
                    Ok((key, Err(err))) => {
                        debug!("Warm of {} failed: {}", key, err);
                        report.failed += 1;
                    }
                    Err(err) => {
                        warn!("Warm task aborted: {}", err);
                        report.failed += 1;
                    }
                }
            }
            debug!("Warm batch {} done ({} keys)", index + 1, batch.len());
        }

        info!(
            "Cache warm finished: {} requested, {} hits, {} misses, {} failed",
            report.requested, report.hits, report.misses, report.failed
        );
        report
    }

    // == Preload ==
    /// Warms a bounded sample of known keys, taken from the durable backend
    /// when reachable and from the local store otherwise.
    pub async fn preload_popular_content(self: &Arc<Self>) -> WarmReport {
        let mut keys = match self
            .durable
            .call("preload", |s| s.keys_matching(CONTENT_PREFIX))
            .await
        {
            Some(keys) => strip_prefix(keys, CONTENT_PREFIX),
            None => {
                let mut keys = self.local.keys().await;
                keys.sort();
                keys
            }
        };
        keys.truncate(self.settings.preload_limit);

        debug!("Preloading {} keys", keys.len());
        self.warm_cache(keys).await
    }

    // == Memory Pressure ==
    /// Fullness ratio: durable used/max memory when both are known, else
    /// local entries/capacity.
    pub async fn memory_pressure(&self) -> f64 {
        if let Some(info) = self.durable.call("memory_info", |s| s.memory_info()).await {
            if info.used_bytes > 0 && info.max_bytes > 0 {
                return info.used_bytes as f64 / info.max_bytes as f64;
            }
        }

        let stats = self.local.stats().await;
        if stats.capacity == 0 {
            0.0
        } else {
            stats.total_entries as f64 / stats.capacity as f64
        }
    }

    // == Evict Least Used ==
    /// Removes up to `count` unpinned entries from both backends, least
    /// remaining TTL first.
    ///
    /// Candidates come from the durable backend when reachable, otherwise from
    /// the local store. Returns the evicted keys in eviction order.
    pub async fn evict_least_used(&self, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }

        let victims = match self.durable_eviction_candidates().await {
            Some(candidates) => {
                let victims = select_victims(candidates, count);
                for key in &victims {
                    self.local.delete(key).await;
                }
                victims
            }
            None => self.local.evict(count).await,
        };

        if !victims.is_empty() {
            let keys: Vec<String> = victims.iter().map(|k| content_key(k)).collect();
            self.durable.call("evict", |s| s.delete(&keys)).await;
            info!("Evicted {} entries", victims.len());
        }
        victims
    }

    async fn durable_eviction_candidates(&self) -> Option<Vec<EvictionCandidate>> {
        let keys = self
            .durable
            .call("evict", |s| s.keys_matching(CONTENT_PREFIX))
            .await?;
        let pins: HashSet<String> = strip_prefix(
            self.durable
                .call("evict", |s| s.keys_matching(PIN_PREFIX))
                .await?,
            PIN_PREFIX,
        )
        .into_iter()
        .collect();

        let mut candidates = Vec::new();
        for cid in strip_prefix(keys, CONTENT_PREFIX) {
            if pins.contains(&cid) || self.local.is_pinned(&cid).await {
                continue;
            }
            let dkey = content_key(&cid);
            let ttl = self
                .durable
                .call("evict", |s| s.ttl_remaining_ms(&dkey))
                .await?;
            candidates.push(EvictionCandidate::new(cid, ttl, 0));
        }
        Some(candidates)
    }

    /// Evicts `count` entries if memory pressure exceeds `threshold`.
    ///
    /// Returns the evicted keys, empty when below threshold.
    pub async fn relieve_memory_pressure(&self, threshold: f64, count: usize) -> Vec<String> {
        let pressure = self.memory_pressure().await;
        if pressure <= threshold {
            debug!("Memory pressure {:.2} within threshold {:.2}", pressure, threshold);
            return Vec::new();
        }
        warn!(
            "Memory pressure {:.2} above threshold {:.2}, evicting up to {} entries",
            pressure, threshold, count
        );
        self.evict_least_used(count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedContent;
    use crate::config::Config;
    use crate::durable::{DurableStore, MemoryStore};
    use std::time::Duration;

    fn config() -> Config {
        Config {
            max_entries: 10,
            default_ttl: 60,
            durable_timeout_ms: 200,
            warm_batch_size: 2,
            warm_batch_delay_ms: 10,
            preload_limit: 3,
            ..Config::default()
        }
    }

    fn text(body: &str) -> CachedContent {
        CachedContent::new(body.as_bytes().to_vec(), "text/plain")
    }

    #[tokio::test]
    async fn test_health_check_reports_durable() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;

        let report = engine.health_check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.backend, ActiveBackend::Durable);

        store.set_available(false);
        let report = engine.health_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.backend, ActiveBackend::Local);
        assert!(report.degraded_since.is_some());

        store.set_available(true);
        assert_eq!(engine.health_check().await.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_health_check_local_only() {
        let engine = CacheEngine::local_only(&config());
        let report = engine.health_check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.backend, ActiveBackend::Local);
    }

    #[tokio::test]
    async fn test_stats_include_durable_section() {
        let store = Arc::new(MemoryStore::new(10_000));
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;

        engine.set("a", text("1"), None).await.unwrap();
        engine.pin("a").await.unwrap();
        engine.get("a").await.unwrap();
        engine.get("missing").await.unwrap();

        let stats = engine.get_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        let durable = stats.durable.unwrap();
        assert_eq!(durable.keys, 1);
        assert_eq!(durable.pinned_keys, 1);
        assert_eq!(durable.memory.max_bytes, 10_000);
    }

    #[tokio::test]
    async fn test_stats_survive_outage() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;
        store.set_available(false);

        let stats = engine.get_stats().await;
        assert!(stats.durable.is_none());
        assert_eq!(stats.status, HealthStatus::Degraded);
        assert_eq!(stats.durable_failures, 1);
    }

    #[tokio::test]
    async fn test_warm_cache_counts_and_isolates_failures() {
        let store = Arc::new(MemoryStore::default());
        for cid in ["w1", "w2", "w3"] {
            let bytes = text(cid).to_envelope().unwrap();
            store.set_with_ttl(&content_key(cid), &bytes, 60).await.unwrap();
        }
        let engine = Arc::new(CacheEngine::with_durable(&config(), store).await);

        let keys = vec![
            "w1".to_string(),
            String::new(),
            "w2".to_string(),
            "absent".to_string(),
            "w3".to_string(),
        ];
        let report = engine.warm_cache(keys).await;

        assert_eq!(
            report,
            WarmReport {
                requested: 5,
                hits: 3,
                misses: 1,
                failed: 1
            }
        );
        assert!(engine.local().contains("w3").await);
    }

    #[tokio::test]
    async fn test_preload_samples_bounded_keys() {
        let store = Arc::new(MemoryStore::default());
        for i in 0..6 {
            let cid = format!("p{}", i);
            let bytes = text(&cid).to_envelope().unwrap();
            store.set_with_ttl(&content_key(&cid), &bytes, 60).await.unwrap();
        }
        let engine = Arc::new(CacheEngine::with_durable(&config(), store).await);

        let report = engine.preload_popular_content().await;

        assert_eq!(report.requested, 3);
        assert_eq!(report.hits, 3);
        assert_eq!(engine.local().len().await, 3);
    }

    #[tokio::test]
    async fn test_preload_falls_back_to_local_keys() {
        let engine = Arc::new(CacheEngine::local_only(&config()));
        engine.set("l1", text("1"), None).await.unwrap();
        engine.set("l2", text("2"), None).await.unwrap();

        let report = engine.preload_popular_content().await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.hits, 2);
    }

    #[tokio::test]
    async fn test_memory_pressure_prefers_durable_ratio() {
        let store = Arc::new(MemoryStore::new(100));
        store.set_with_ttl("k", &[0u8; 49], 0).await.unwrap();
        let engine = CacheEngine::with_durable(&config(), store).await;

        let pressure = engine.memory_pressure().await;
        assert!((pressure - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_memory_pressure_falls_back_to_local_ratio() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store).await;
        for i in 0..4 {
            engine.set(&format!("k{}", i), text("x"), None).await.unwrap();
        }

        // No durable limit configured
        assert!((engine.memory_pressure().await - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_evict_least_used_by_durable_ttl() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;

        engine.set("long", text("a"), Some(300)).await.unwrap();
        engine.set("short", text("b"), Some(10)).await.unwrap();
        engine.set("mid", text("c"), Some(100)).await.unwrap();

        assert_eq!(engine.evict_least_used(1).await, vec!["short".to_string()]);
        assert!(!store.exists("content:short").await.unwrap());
        assert!(!engine.local().contains("short").await);
        assert!(engine.local().contains("mid").await);
    }

    #[tokio::test]
    async fn test_evict_skips_pinned() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store).await;

        engine.set("pinned", text("a"), Some(5)).await.unwrap();
        engine.set("plain", text("b"), Some(300)).await.unwrap();
        engine.pin("pinned").await.unwrap();

        assert_eq!(engine.evict_least_used(5).await, vec!["plain".to_string()]);
        assert!(engine.get("pinned").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_evict_uses_local_when_degraded() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;

        engine.set("a", text("a"), Some(300)).await.unwrap();
        engine.set("b", text("b"), Some(20)).await.unwrap();
        store.set_available(false);

        assert_eq!(engine.evict_least_used(1).await, vec!["b".to_string()]);
        assert!(engine.local().contains("a").await);
    }

    #[tokio::test]
    async fn test_evict_zero_is_noop() {
        let engine = CacheEngine::local_only(&config());
        engine.set("a", text("a"), None).await.unwrap();
        assert!(engine.evict_least_used(0).await.is_empty());
        assert_eq!(engine.local().len().await, 1);
    }

    #[tokio::test]
    async fn test_relieve_memory_pressure() {
        let engine = CacheEngine::local_only(&config());
        for i in 0..10 {
            engine
                .set(&format!("k{}", i), text("x"), Some(100 + i))
                .await
                .unwrap();
        }

        assert!(engine.relieve_memory_pressure(1.0, 3).await.is_empty());
        let evicted = engine.relieve_memory_pressure(0.9, 3).await;
        assert_eq!(evicted, vec!["k0".to_string(), "k1".to_string(), "k2".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_and_degrades() {
        let store = Arc::new(MemoryStore::default());
        let engine = CacheEngine::with_durable(&config(), store.clone()).await;
        store.set_latency(Duration::from_millis(500));

        engine.set("slow", text("x"), None).await.unwrap();

        assert!(engine.get("slow").await.unwrap().is_some());
        assert_eq!(engine.health_check().await.status, HealthStatus::Degraded);
    }
}
