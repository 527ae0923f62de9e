//! Cache & Pinning Engine
//!
//! Orchestrates the local store and the durable backend.
//!
//! Writes go to the local store first (mandatory) and then to the durable
//! backend (best effort). Reads prefer the durable backend while it is
//! reachable and mirror hits into the local store. Durable failures never reach
//! the caller; they degrade the engine to local-only operation until a
//! liveness probe succeeds.
//!
//! # Consistency
//! The two backends are not linearizable. A durable write may still be in
//! flight when a concurrent reader on another instance looks the key up. A
//! durable miss is authoritative and drops the local copy, except for pinned
//! entries, which are written back.

mod maintenance;
mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{validate_key, CachedContent, LocalStore};
use crate::config::Config;
use crate::durable::{content_key, pin_key, DurableStore, GuardedDurable, RedisStore};
use crate::error::Result;
use crate::health::HealthTracker;

pub use types::{
    ActiveBackend, DurableStats, EngineStats, HealthReport, HealthStatus, WarmReport,
};

/// Value stored under a durable pin marker.
const PIN_MARKER: &[u8] = b"1";

// == Engine Settings ==
/// Tunables the engine reads on every call.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_ttl: u64,
    pub warm_batch_size: usize,
    pub warm_batch_delay: Duration,
    pub preload_limit: usize,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_ttl: config.default_ttl,
            warm_batch_size: config.warm_batch_size.max(1),
            warm_batch_delay: config.warm_batch_delay(),
            preload_limit: config.preload_limit,
        }
    }
}

// == Cache Engine ==
pub struct CacheEngine {
    local: LocalStore,
    durable: GuardedDurable,
    settings: EngineSettings,
    hits: AtomicU64,
    misses: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheEngine {
    // == Constructors ==
    /// Builds an engine over explicit backends. Does not probe.
    pub fn new(local: LocalStore, durable: GuardedDurable, settings: EngineSettings) -> Self {
        Self {
            local,
            durable,
            settings,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Engine with only a local store.
    pub fn local_only(config: &Config) -> Self {
        let health = Arc::new(HealthTracker::new());
        Self::new(
            LocalStore::new(config.max_entries),
            GuardedDurable::local_only(health),
            EngineSettings::from(config),
        )
    }

    /// Engine over the given durable backend, probed once before returning.
    pub async fn with_durable(config: &Config, store: Arc<dyn DurableStore>) -> Self {
        let health = Arc::new(HealthTracker::new());
        let engine = Self::new(
            LocalStore::new(config.max_entries),
            GuardedDurable::new(store, health, config.durable_timeout()),
            EngineSettings::from(config),
        );
        engine.durable.probe().await;
        engine
    }

    // == Lifecycle ==
    /// Connects to the configured durable backend.
    ///
    /// Never fails: an unreachable backend leaves the engine degraded and a
    /// malformed URL leaves it local-only.
    pub async fn initialize(config: &Config) -> Arc<Self> {
        let Some(url) = config.durable_url.as_deref() else {
            info!("No durable backend configured, running local-only");
            return Arc::new(Self::local_only(config));
        };

        let store = match RedisStore::open(url, config.durable_key_prefix.clone(), config.durable_timeout()) {
            Ok(store) => store,
            Err(err) => {
                warn!("Invalid durable backend URL, running local-only: {}", err);
                return Arc::new(Self::local_only(config));
            }
        };

        if let Err(err) = store.connect(config.durable_retries).await {
            warn!("Durable backend unreachable at startup, starting degraded: {}", err);
        }

        let engine = Self::with_durable(config, Arc::new(store)).await;
        info!(
            "Cache engine initialized: capacity={}, default_ttl={}s, durable={:?}",
            config.max_entries,
            config.default_ttl,
            engine.durable.health().state()
        );
        Arc::new(engine)
    }

    /// Starts TTL sweep, health re-probe and memory-pressure monitor.
    pub async fn start_background_tasks(self: &Arc<Self>, config: &Config) {
        let handles = vec![
            crate::tasks::spawn_cleanup_task(self.local.clone(), config.cleanup_interval),
            crate::tasks::spawn_health_probe(Arc::clone(self), config.health_probe_interval),
            crate::tasks::spawn_pressure_monitor(
                Arc::clone(self),
                config.pressure_check_interval,
                config.pressure_threshold,
                config.pressure_evict_count,
            ),
        ];
        self.tasks.lock().await.extend(handles);
    }

    /// Stops background tasks. The stores remain usable.
    pub async fn destroy(&self) {
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        info!("Cache engine stopped {} background tasks", handles.len());
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // == Get ==
    /// Looks up content. A miss in both backends is `Ok(None)`.
    ///
    /// While the durable backend is reachable it decides: a durable miss drops
    /// the local copy unless that copy is pinned.
    pub async fn get(&self, key: &str) -> Result<Option<CachedContent>> {
        validate_key(key)?;
        let dkey = content_key(key);

        let found = match self.durable.call("get", |s| s.get(&dkey)).await {
            Some(Some(bytes)) => match CachedContent::from_envelope(&bytes) {
                Ok(content) => {
                    self.mirror_locally(key, &content).await;
                    Some(content)
                }
                Err(err) => {
                    warn!("Ignoring undecodable durable entry {}: {}", key, err);
                    self.local.get(key).await
                }
            },
            Some(None) => {
                if self.local.is_pinned(key).await {
                    let local = self.local.get(key).await;
                    if let Some(content) = &local {
                        self.restore_pinned(key, content).await;
                    }
                    local
                } else {
                    if self.local.delete(key).await {
                        debug!("Dropped local copy of {} missing from durable backend", key);
                    }
                    None
                }
            }
            None => self.local.get(key).await,
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(found)
    }

    /// Copies a durable hit into the local store with the durable entry's
    /// remaining lifetime. Skipped when that lifetime cannot be read.
    async fn mirror_locally(&self, key: &str, content: &CachedContent) {
        let dkey = content_key(key);
        let ttl_seconds = match self.durable.call("pttl", |s| s.ttl_remaining_ms(&dkey)).await {
            Some(Some(ms)) => (ms / 1000).max(1),
            Some(None) => 0,
            None => return,
        };
        if let Err(err) = self.local.set(key, content.clone(), ttl_seconds).await {
            warn!("Could not mirror {} into local store: {}", key, err);
        }
    }

    /// Re-seeds the durable backend with a locally pinned entry it lacks,
    /// e.g. one pinned while degraded.
    async fn restore_pinned(&self, key: &str, content: &CachedContent) {
        debug!("Restoring pinned {} to durable backend", key);
        self.write_durable(key, content, 0).await;
        let pkey = pin_key(key);
        self.durable
            .call("pin", |s| s.set_with_ttl(&pkey, PIN_MARKER, 0))
            .await;
    }

    async fn write_durable(&self, key: &str, content: &CachedContent, ttl_seconds: u64) {
        let bytes = match content.to_envelope() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Could not encode {} for durable backend: {}", key, err);
                return;
            }
        };
        let dkey = content_key(key);
        self.durable
            .call("set", |s| s.set_with_ttl(&dkey, &bytes, ttl_seconds))
            .await;
    }

    // == Set ==
    /// Stores content. `ttl` of `None` uses the default TTL, `Some(0)` never expires.
    ///
    /// A pinned key stays pinned across re-sets.
    pub async fn set(&self, key: &str, content: CachedContent, ttl: Option<u64>) -> Result<()> {
        validate_key(key)?;
        let ttl_seconds = ttl.unwrap_or(self.settings.default_ttl);

        self.local.set(key, content.clone(), ttl_seconds).await?;

        let pkey = pin_key(key);
        let durable_pinned = self
            .durable
            .call("exists", |s| s.exists(&pkey))
            .await
            .unwrap_or(false);
        if durable_pinned {
            self.local.pin(key).await;
        }
        let pinned = durable_pinned || self.local.is_pinned(key).await;

        self.write_durable(key, &content, if pinned { 0 } else { ttl_seconds })
            .await;
        debug!("Cached {} ({} bytes, ttl={}s, pinned={})", key, content.size, ttl_seconds, pinned);
        Ok(())
    }

    // == Pin ==
    /// Exempts a cached key from expiry and eviction.
    ///
    /// Returns `Ok(false)` without side effects when the key is not cached.
    pub async fn pin(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let dkey = content_key(key);
        let pkey = pin_key(key);

        let mut pinned = self.local.pin(key).await;
        if !pinned {
            if let Some(Some(bytes)) = self.durable.call("get", |s| s.get(&dkey)).await {
                match CachedContent::from_envelope(&bytes) {
                    Ok(content) => {
                        self.local.set(key, content, self.settings.default_ttl).await?;
                        pinned = self.local.pin(key).await;
                    }
                    Err(err) => warn!("Ignoring undecodable durable entry {}: {}", key, err),
                }
            }
        }
        if !pinned {
            debug!("Pin of uncached key {} ignored", key);
            return Ok(false);
        }

        if self.durable.is_available() {
            let stored = self
                .durable
                .call("exists", |s| s.exists(&dkey))
                .await
                .unwrap_or(false);
            if stored {
                self.durable.call("persist", |s| s.persist(&dkey)).await;
            } else if let Some(content) = self.local.peek(key).await {
                self.write_durable(key, &content, 0).await;
            }
            self.durable
                .call("pin", |s| s.set_with_ttl(&pkey, PIN_MARKER, 0))
                .await;
        }

        info!("Pinned {}", key);
        Ok(true)
    }

    // == Unpin ==
    /// Returns a pinned key to the default TTL lifecycle. Data is kept.
    ///
    /// Returns whether a pin existed in either backend. An unpinned key keeps
    /// its TTL.
    pub async fn unpin(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let ttl_seconds = self.settings.default_ttl;
        let dkey = content_key(key);
        let pkeys = [pin_key(key)];

        let was_local = self.local.is_pinned(key).await;
        let was_durable = self
            .durable
            .call("unpin", |s| s.delete(&pkeys))
            .await
            .is_some_and(|removed| removed > 0);
        if !was_local && !was_durable {
            return Ok(false);
        }

        self.local.unpin(key, ttl_seconds).await;
        // EXPIRE 0 would delete the key outright
        if ttl_seconds > 0 {
            self.durable
                .call("expire", |s| s.expire(&dkey, ttl_seconds))
                .await;
        }

        info!("Unpinned {}", key);
        Ok(true)
    }

    // == Is Pinned ==
    /// Answers from the durable marker while reachable, else from the local flag.
    pub async fn is_pinned(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let pkey = pin_key(key);
        match self.durable.call("is_pinned", |s| s.exists(&pkey)).await {
            Some(pinned) => Ok(pinned),
            None => Ok(self.local.is_pinned(key).await),
        }
    }

    // == Delete ==
    /// Removes content and pin marker from both backends. Idempotent.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let existed_locally = self.local.delete(key).await;

        let keys = [content_key(key), pin_key(key)];
        let removed = self
            .durable
            .call("delete", |s| s.delete(&keys))
            .await
            .unwrap_or(0);

        debug!("Deleted {}", key);
        Ok(existed_locally || removed > 0)
    }

    // == Clear ==
    /// Removes every entry and pin from both backends.
    ///
    /// Returns the number of local entries removed.
    pub async fn clear(&self) -> usize {
        let removed = self.local.clear().await;

        let content = self
            .durable
            .call("keys", |s| s.keys_matching(crate::durable::CONTENT_PREFIX))
            .await;
        let pins = self
            .durable
            .call("keys", |s| s.keys_matching(crate::durable::PIN_PREFIX))
            .await;
        if let (Some(mut keys), Some(pins)) = (content, pins) {
            keys.extend(pins);
            let flushed = self
                .durable
                .call("clear", |s| s.delete(&keys))
                .await
                .unwrap_or(0);
            info!("Cleared {} local entries and {} durable keys", removed, flushed);
        } else {
            info!("Cleared {} local entries (durable backend skipped)", removed);
        }
        removed
    }

    fn record_counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::MemoryStore;
    use crate::error::CacheError;

    fn config() -> Config {
        Config {
            max_entries: 16,
            default_ttl: 60,
            durable_timeout_ms: 200,
            ..Config::default()
        }
    }

    async fn engine_with(store: Arc<MemoryStore>) -> CacheEngine {
        CacheEngine::with_durable(&config(), store).await
    }

    fn text(body: &str) -> CachedContent {
        CachedContent::new(body.as_bytes().to_vec(), "text/plain")
    }

    #[tokio::test]
    async fn test_set_writes_both_backends() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-1", text("hello"), None).await.unwrap();

        assert!(engine.local().contains("cid-1").await);
        assert!(store.exists("content:cid-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_mirrors_durable_hit() {
        let store = Arc::new(MemoryStore::default());
        let bytes = text("from-durable").to_envelope().unwrap();
        store.set_with_ttl("content:cid-9", &bytes, 60).await.unwrap();
        let engine = engine_with(store).await;

        let found = engine.get("cid-9").await.unwrap().unwrap();

        assert_eq!(found.data, b"from-durable");
        assert!(engine.local().contains("cid-9").await);
    }

    #[tokio::test]
    async fn test_get_mirror_keeps_durable_ttl() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;
        let bytes = text("short").to_envelope().unwrap();
        store.set_with_ttl("content:cid-8", &bytes, 2).await.unwrap();

        assert!(engine.get("cid-8").await.unwrap().is_some());

        let local_ttl = engine.local().ttl_remaining_ms("cid-8").await.unwrap();
        assert!(local_ttl <= 2_000);
    }

    #[tokio::test]
    async fn test_get_durable_miss_drops_local_copy() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;
        engine.local().set("cid-3", text("local"), 60).await.unwrap();

        assert!(engine.get("cid-3").await.unwrap().is_none());
        assert!(!engine.local().contains("cid-3").await);
        assert!(!store.exists("content:cid-3").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_durable_miss_restores_pinned_copy() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;
        engine.local().set("cid-6", text("pinned"), 60).await.unwrap();
        engine.local().pin("cid-6").await;

        assert_eq!(engine.get("cid-6").await.unwrap().unwrap().data, b"pinned");
        assert!(store.exists("content:cid-6").await.unwrap());
        assert!(store.exists("pin:cid-6").await.unwrap());
        assert!(store.ttl_remaining_ms("content:cid-6").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_on_one_engine_is_seen_by_another() {
        let store = Arc::new(MemoryStore::default());
        let writer = engine_with(store.clone()).await;
        let reader = engine_with(store.clone()).await;

        writer.set("shared", text("v"), None).await.unwrap();
        assert!(reader.get("shared").await.unwrap().is_some());
        writer.delete("shared").await.unwrap();

        assert!(reader.get("shared").await.unwrap().is_none());
        assert!(!store.exists("content:shared").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_ignores_corrupt_durable_value() {
        let store = Arc::new(MemoryStore::default());
        store.set_with_ttl("content:cid-4", b"garbage", 60).await.unwrap();
        let engine = engine_with(store).await;

        assert!(engine.get("cid-4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let engine = CacheEngine::local_only(&config());

        assert!(matches!(engine.get("").await, Err(CacheError::InvalidKey(_))));
        assert!(matches!(engine.pin("").await, Err(CacheError::InvalidKey(_))));
        assert!(matches!(
            engine.set("", text("x"), None).await,
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_pin_sets_marker_and_persists() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-2", text("keep"), Some(30)).await.unwrap();
        assert!(engine.pin("cid-2").await.unwrap());

        assert!(store.exists("pin:cid-2").await.unwrap());
        assert!(store.ttl_remaining_ms("content:cid-2").await.unwrap().is_none());
        assert!(engine.is_pinned("cid-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_missing_key_is_noop() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        assert!(!engine.pin("missing").await.unwrap());
        assert!(!store.exists("pin:missing").await.unwrap());
        assert!(!engine.is_pinned("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_pulls_durable_only_entry() {
        let store = Arc::new(MemoryStore::default());
        let bytes = text("remote").to_envelope().unwrap();
        store.set_with_ttl("content:cid-5", &bytes, 60).await.unwrap();
        let engine = engine_with(store).await;

        assert!(engine.pin("cid-5").await.unwrap());
        assert!(engine.local().is_pinned("cid-5").await);
    }

    #[tokio::test]
    async fn test_reset_of_pinned_key_stays_pinned() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-2", text("v1"), None).await.unwrap();
        engine.pin("cid-2").await.unwrap();
        engine.set("cid-2", text("v2"), Some(1)).await.unwrap();

        assert!(store.ttl_remaining_ms("content:cid-2").await.unwrap().is_none());
        assert!(engine.local().is_pinned("cid-2").await);
    }

    #[tokio::test]
    async fn test_unpin_restores_default_ttl() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-2", text("keep"), None).await.unwrap();
        engine.pin("cid-2").await.unwrap();
        assert!(engine.unpin("cid-2").await.unwrap());

        assert!(!store.exists("pin:cid-2").await.unwrap());
        let remaining = store.ttl_remaining_ms("content:cid-2").await.unwrap().unwrap();
        assert!(remaining > 59_000 && remaining <= 60_000);
        assert!(!engine.is_pinned("cid-2").await.unwrap());
        assert!(engine.get("cid-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unpin_of_unpinned_key_keeps_ttl() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-7", text("short"), Some(5)).await.unwrap();
        assert!(!engine.unpin("cid-7").await.unwrap());

        let durable = store.ttl_remaining_ms("content:cid-7").await.unwrap().unwrap();
        let local = engine.local().ttl_remaining_ms("cid-7").await.unwrap();
        assert!(durable <= 5_000);
        assert!(local <= 5_000);
    }

    #[tokio::test]
    async fn test_delete_removes_marker_and_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("cid-1", text("x"), None).await.unwrap();
        engine.pin("cid-1").await.unwrap();

        assert!(engine.delete("cid-1").await.unwrap());
        assert!(!engine.delete("cid-1").await.unwrap());
        assert!(store.is_empty().await);
        assert!(engine.get("cid-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_empties_both_backends() {
        let store = Arc::new(MemoryStore::default());
        let engine = engine_with(store.clone()).await;

        engine.set("a", text("1"), None).await.unwrap();
        engine.set("b", text("2"), None).await.unwrap();
        engine.pin("b").await.unwrap();

        assert_eq!(engine.clear().await, 2);
        assert!(store.is_empty().await);
        assert!(engine.local().is_empty().await);
    }

    #[tokio::test]
    async fn test_destroy_aborts_tasks() {
        let engine = Arc::new(CacheEngine::local_only(&config()));
        engine.start_background_tasks(&config()).await;
        assert_eq!(engine.tasks.lock().await.len(), 3);

        engine.destroy().await;
        assert!(engine.tasks.lock().await.is_empty());
    }
}
