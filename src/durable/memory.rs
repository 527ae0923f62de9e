//! In-process durable store.
//!
//! Implements the full backend contract in memory. It can be switched off or
//! slowed down at runtime, which is how outage and timeout behaviour is
//! exercised without a network backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DurableStore, MemoryInfo};
use crate::cache::current_timestamp_ms;
use crate::error::{DurableError, DurableResult};

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    /// Unix ms, None = no expiry
    expires_at: Option<u64>,
}

impl StoredValue {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    max_bytes: u64,
}

impl MemoryStore {
    /// Creates an available store; `max_bytes` of 0 reports no memory limit.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            max_bytes,
        }
    }

    /// Switches the backend on or off. While off every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Release);
    }

    /// Number of live keys, bypassing availability.
    pub async fn len(&self) -> usize {
        let now = current_timestamp_ms();
        self.values
            .read()
            .await
            .values()
            .filter(|v| v.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn gate(&self) -> DurableResult<()> {
        let latency = self.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DurableError::Unavailable)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(0)
    }
}

fn expiry(ttl_seconds: u64) -> Option<u64> {
    (ttl_seconds > 0).then(|| current_timestamp_ms() + ttl_seconds * 1000)
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> DurableResult<Option<Vec<u8>>> {
        self.gate().await?;
        let now = current_timestamp_ms();
        let mut values = self.values.write().await;
        match values.get(key) {
            Some(v) if v.is_live(now) => Ok(Some(v.data.clone())),
            Some(_) => {
                values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl_seconds: u64) -> DurableResult<()> {
        self.gate().await?;
        self.values.write().await.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at: expiry(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> DurableResult<u64> {
        self.gate().await?;
        let now = current_timestamp_ms();
        let mut values = self.values.write().await;
        let removed = keys
            .iter()
            .filter_map(|k| values.remove(k))
            .filter(|v| v.is_live(now))
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> DurableResult<bool> {
        self.gate().await?;
        let now = current_timestamp_ms();
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .is_some_and(|v| v.is_live(now)))
    }

    async fn persist(&self, key: &str) -> DurableResult<bool> {
        self.gate().await?;
        let now = current_timestamp_ms();
        match self.values.write().await.get_mut(key) {
            Some(v) if v.is_live(now) && v.expires_at.is_some() => {
                v.expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> DurableResult<bool> {
        self.gate().await?;
        let now = current_timestamp_ms();
        match self.values.write().await.get_mut(key) {
            Some(v) if v.is_live(now) => {
                v.expires_at = Some(now + ttl_seconds * 1000);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl_remaining_ms(&self, key: &str) -> DurableResult<Option<u64>> {
        self.gate().await?;
        let now = current_timestamp_ms();
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .filter(|v| v.is_live(now))
            .and_then(|v| v.expires_at)
            .map(|at| at.saturating_sub(now)))
    }

    async fn ping(&self) -> DurableResult<()> {
        self.gate().await
    }

    async fn keys_matching(&self, prefix: &str) -> DurableResult<Vec<String>> {
        self.gate().await?;
        let now = current_timestamp_ms();
        let mut keys: Vec<String> = self
            .values
            .read()
            .await
            .iter()
            .filter(|(k, v)| k.starts_with(prefix) && v.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn memory_info(&self) -> DurableResult<MemoryInfo> {
        self.gate().await?;
        let now = current_timestamp_ms();
        let used_bytes = self
            .values
            .read()
            .await
            .iter()
            .filter(|(_, v)| v.is_live(now))
            .map(|(k, v)| (k.len() + v.data.len()) as u64)
            .sum();
        Ok(MemoryInfo {
            used_bytes,
            max_bytes: self.max_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::default();

        store.set_with_ttl("k", b"v", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        assert_eq!(store.delete(&["k".to_string()]).await.unwrap(), 1);
        assert_eq!(store.delete(&["k".to_string()]).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry_and_persist() {
        let store = MemoryStore::default();

        store.set_with_ttl("short", b"v", 1).await.unwrap();
        store.set_with_ttl("kept", b"v", 1).await.unwrap();
        assert!(store.persist("kept").await.unwrap());
        assert!(store.ttl_remaining_ms("kept").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert!(store.exists("kept").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_restores_ttl() {
        let store = MemoryStore::default();

        store.set_with_ttl("k", b"v", 0).await.unwrap();
        assert!(store.expire("k", 30).await.unwrap());

        let remaining = store.ttl_remaining_ms("k").await.unwrap().unwrap();
        assert!(remaining <= 30_000 && remaining > 29_000);
        assert!(!store.expire("missing", 30).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_matching_prefix() {
        let store = MemoryStore::default();

        store.set_with_ttl("content:a", b"1", 0).await.unwrap();
        store.set_with_ttl("content:b", b"2", 0).await.unwrap();
        store.set_with_ttl("pin:a", b"", 0).await.unwrap();

        let keys = store.keys_matching("content:").await.unwrap();
        assert_eq!(keys, vec!["content:a".to_string(), "content:b".to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::default();
        store.set_available(false);

        assert!(matches!(store.ping().await, Err(DurableError::Unavailable)));
        assert!(store.get("k").await.is_err());
        assert!(store.set_with_ttl("k", b"v", 1).await.is_err());

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_info() {
        let store = MemoryStore::new(1000);
        store.set_with_ttl("key", b"12345", 0).await.unwrap();

        let info = store.memory_info().await.unwrap();
        assert_eq!(info.used_bytes, 8);
        assert_eq!(info.max_bytes, 1000);
    }
}
