//! Cache Store Module
//!
//! Local store combining HashMap storage with TTL expiration, pin flags and
//! TTL-ranked capacity eviction.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::eviction::{select_victims, EvictionCandidate};
use crate::cache::{validate_key, CacheEntry, CachedContent, LocalStats, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Bounded in-memory store. Not synchronized; see [`LocalStore`].
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: LocalStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            stats: LocalStats::new(max_entries),
            max_entries,
        }
    }

    // == Set ==
    /// Stores content under `key` with a TTL in seconds (`0` = no expiry).
    ///
    /// An existing entry is replaced; if it was pinned, the replacement stays
    /// pinned. A new key at capacity first purges expired entries, then evicts
    /// the unpinned entry with the least remaining TTL.
    pub fn set(&mut self, key: String, value: CachedContent, ttl_seconds: u64) -> Result<()> {
        validate_key(&key)?;

        if value.data.len() > MAX_VALUE_SIZE {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        let was_pinned = match self.entries.get(&key) {
            Some(existing) => existing.pinned,
            None => {
                self.make_room()?;
                false
            }
        };

        let mut entry = CacheEntry::new(value, ttl_seconds);
        if was_pinned {
            entry.pin();
        }
        self.entries.insert(key, entry);

        Ok(())
    }

    fn make_room(&mut self) -> Result<()> {
        if self.entries.len() < self.max_entries {
            return Ok(());
        }

        self.cleanup_expired();
        if self.entries.len() < self.max_entries {
            return Ok(());
        }

        if self.evict(1).is_empty() {
            return Err(CacheError::CapacityExhausted(format!(
                "all {} local entries are pinned",
                self.entries.len()
            )));
        }
        Ok(())
    }

    // == Get ==
    /// Retrieves content by key.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<CachedContent> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Returns live content without touching statistics.
    pub fn peek(&self, key: &str) -> Option<CachedContent> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone())
    }

    /// Returns true if a live entry exists, without touching statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| !e.is_expired())
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Clear ==
    /// Removes every entry, pinned or not. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // == Keys ==
    /// Returns all live keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Pinning ==
    /// Pins a live entry. Returns false if the key is absent.
    pub fn pin(&mut self, key: &str) -> bool {
        if !self.contains(key) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.pin();
                true
            }
            None => false,
        }
    }

    /// Unpins an entry, restoring a TTL of `ttl_seconds`. Returns false if absent.
    pub fn unpin(&mut self, key: &str, ttl_seconds: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.unpin(ttl_seconds);
                true
            }
            None => false,
        }
    }

    pub fn is_pinned(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.pinned)
    }

    // == Evict ==
    /// Removes up to `count` unpinned entries, least remaining TTL first.
    ///
    /// Returns the evicted keys in eviction order.
    pub fn evict(&mut self, count: usize) -> Vec<String> {
        let candidates = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.pinned)
            .map(|(key, entry)| {
                EvictionCandidate::new(key.clone(), entry.ttl_remaining_ms(), entry.created_at)
            })
            .collect();

        let victims = select_victims(candidates, count);
        for key in &victims {
            self.entries.remove(key);
        }
        self.stats.record_evictions(victims.len());
        victims
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Pinned entries are never expired.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> LocalStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.pinned_entries = self.entries.values().filter(|e| e.pinned).count();
        stats
    }

    /// Remaining TTL of a live entry in milliseconds, None when absent or unbounded.
    pub fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(|e| e.ttl_remaining_ms())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

// == Local Store ==
/// Shareable, internally synchronized handle to a [`CacheStore`].
///
/// Every operation holds the lock only for an in-memory map access.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<RwLock<CacheStore>>,
}

impl LocalStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheStore::new(max_entries))),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedContent> {
        self.inner.write().await.get(key)
    }

    pub async fn set(&self, key: &str, value: CachedContent, ttl_seconds: u64) -> Result<()> {
        self.inner.write().await.set(key.to_string(), value, ttl_seconds)
    }

    pub async fn peek(&self, key: &str) -> Option<CachedContent> {
        self.inner.read().await.peek(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.contains(key)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.delete(key)
    }

    pub async fn clear(&self) -> usize {
        self.inner.write().await.clear()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.read().await.keys()
    }

    pub async fn pin(&self, key: &str) -> bool {
        self.inner.write().await.pin(key)
    }

    pub async fn unpin(&self, key: &str, ttl_seconds: u64) -> bool {
        self.inner.write().await.unpin(key, ttl_seconds)
    }

    pub async fn is_pinned(&self, key: &str) -> bool {
        self.inner.read().await.is_pinned(key)
    }

    pub async fn evict(&self, count: usize) -> Vec<String> {
        self.inner.write().await.evict(count)
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.inner.write().await.cleanup_expired()
    }

    pub async fn stats(&self) -> LocalStats {
        self.inner.read().await.stats()
    }

    pub async fn ttl_remaining_ms(&self, key: &str) -> Option<u64> {
        self.inner.read().await.ttl_remaining_ms(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn capacity(&self) -> usize {
        self.inner.read().await.capacity()
    }
}
