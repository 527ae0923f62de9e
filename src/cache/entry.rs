//! Cache Entry Module
//!
//! Defines the cached payload, its durable envelope, and the local entry with TTL support.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DurableError, DurableResult};

// == Cached Content ==
/// Payload stored under a content identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedContent {
    /// Raw content bytes
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type reported by the upstream source
    pub content_type: String,
    /// Payload size in bytes
    pub size: u64,
    /// Time of insertion or last refresh
    pub cached_at: DateTime<Utc>,
}

impl CachedContent {
    /// Creates content stamped with the current time.
    pub fn new(data: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            size: data.len() as u64,
            data,
            content_type: content_type.into(),
            cached_at: Utc::now(),
        }
    }

    /// Serializes into the envelope written to the durable backend.
    pub fn to_envelope(&self) -> DurableResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an envelope read from the durable backend.
    pub fn from_envelope(bytes: &[u8]) -> DurableResult<Self> {
        let content: Self = serde_json::from_slice(bytes)?;
        if content.size != content.data.len() as u64 {
            return Err(DurableError::Codec(format!(
                "envelope size {} does not match payload length {}",
                content.size,
                content.data.len()
            )));
        }
        Ok(content)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// == Cache Entry ==
/// Represents a single local store entry with payload and expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub value: CachedContent,
    /// Insertion timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Pinned entries never expire and are never evicted
    pub pinned: bool,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry. A TTL of `0` means no expiry.
    ///
    /// # Arguments
    /// * `value` - The payload to store
    /// * `ttl_seconds` - TTL in seconds, `0` for none
    pub fn new(value: CachedContent, ttl_seconds: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: expiry_from(now, ttl_seconds),
            pinned: false,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    /// Pinned entries never expire.
    pub fn is_expired(&self) -> bool {
        if self.pinned {
            return false;
        }
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Pin ==
    /// Marks the entry pinned and drops its expiry.
    pub fn pin(&mut self) {
        self.pinned = true;
        self.expires_at = None;
    }

    // == Unpin ==
    /// Returns the entry to a bounded lifecycle of `ttl_seconds` from now.
    pub fn unpin(&mut self, ttl_seconds: u64) {
        self.pinned = false;
        self.expires_at = expiry_from(current_timestamp_ms(), ttl_seconds);
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms / 1000)
    }
}

fn expiry_from(now: u64, ttl_seconds: u64) -> Option<u64> {
    if ttl_seconds == 0 {
        None
    } else {
        Some(now.saturating_add(ttl_seconds.saturating_mul(1000)))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn content(text: &str) -> CachedContent {
        CachedContent::new(text.as_bytes().to_vec(), "text/plain")
    }

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(content("hello"), 0);

        assert_eq!(entry.value.data, b"hello");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(content("hello"), 60);

        assert_eq!(entry.value.size, 5);
        assert!(entry.expires_at.is_some());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(content("hello"), 1);

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_pinned_entry_never_expires() {
        let mut entry = CacheEntry::new(content("hello"), 1);
        entry.pin();

        sleep(Duration::from_millis(1100));

        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_unpin_restores_ttl() {
        let mut entry = CacheEntry::new(content("hello"), 1);
        entry.pin();
        entry.unpin(10);

        assert!(!entry.pinned);
        let remaining = entry.ttl_remaining().unwrap();
        assert!((9..=10).contains(&remaining));
    }

    #[test]
    fn test_ttl_remaining_expired() {
        let entry = CacheEntry::new(content("hello"), 1);

        sleep(Duration::from_millis(1100));

        assert_eq!(entry.ttl_remaining().unwrap(), 0);
        assert_eq!(entry.ttl_remaining_ms().unwrap(), 0);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry {
            value: content("test"),
            created_at: now,
            expires_at: Some(now),
            pinned: false,
        };

        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }

    #[test]
    fn test_envelope_preserves_binary_payload() {
        let original = CachedContent::new(vec![0u8, 159, 146, 150, 255], "application/octet-stream");

        let bytes = original.to_envelope().unwrap();
        let decoded = CachedContent::from_envelope(&bytes).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_envelope_rejects_size_mismatch() {
        let mut original = content("hello");
        original.size = 99;

        let bytes = original.to_envelope().unwrap();
        let result = CachedContent::from_envelope(&bytes);

        assert!(matches!(result, Err(DurableError::Codec(_))));
    }

    #[test]
    fn test_envelope_rejects_garbage() {
        assert!(CachedContent::from_envelope(b"not json").is_err());
    }
}
