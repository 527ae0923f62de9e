//! Durable Store Module
//!
//! Network key/value backend with native TTL, and the single boundary that
//! turns its failures into degraded-mode fallbacks.
//!
//! # Key layout
//! Within the configured namespace, content lives under `content:<cid>` and
//! pin markers under `pin:<cid>`. Pin markers carry no TTL.

mod guarded;
mod memory;
mod redis_store;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DurableResult;

pub use guarded::{DurableFuture, GuardedDurable};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Prefix of content keys inside the namespace.
pub const CONTENT_PREFIX: &str = "content:";

/// Prefix of pin marker keys inside the namespace.
pub const PIN_PREFIX: &str = "pin:";

pub fn content_key(cid: &str) -> String {
    format!("{}{}", CONTENT_PREFIX, cid)
}

pub fn pin_key(cid: &str) -> String {
    format!("{}{}", PIN_PREFIX, cid)
}

// == Memory Info ==
/// Backend memory usage as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub used_bytes: u64,
    /// 0 when the backend has no configured limit
    pub max_bytes: u64,
}

// == Durable Store Trait ==
/// Contract the engine requires from a durable key/value backend.
///
/// Keys passed in and returned are relative to the store's namespace.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> DurableResult<Option<Vec<u8>>>;

    /// Writes `value`; a TTL of `0` writes without expiry.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl_seconds: u64) -> DurableResult<()>;

    /// Deletes the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> DurableResult<u64>;

    async fn exists(&self, key: &str) -> DurableResult<bool>;

    /// Removes the TTL of `key`. Returns false if the key is absent or had none.
    async fn persist(&self, key: &str) -> DurableResult<bool>;

    /// Sets the TTL of `key`. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> DurableResult<bool>;

    /// Remaining TTL in milliseconds; None when absent or without expiry.
    async fn ttl_remaining_ms(&self, key: &str) -> DurableResult<Option<u64>>;

    async fn ping(&self) -> DurableResult<()>;

    /// Enumerates keys starting with `prefix`.
    async fn keys_matching(&self, prefix: &str) -> DurableResult<Vec<String>>;

    async fn memory_info(&self) -> DurableResult<MemoryInfo>;
}
