//! Cache Module
//!
//! Provides the local store: bounded in-memory caching with TTL expiration,
//! pin flags and TTL-ranked eviction.

mod entry;
mod eviction;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, CachedContent};
pub use eviction::{select_victims, EvictionCandidate};
pub use stats::LocalStats;
pub use store::{CacheStore, LocalStore};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed payload size in bytes
pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024; // 8 MiB

/// Rejects empty or over-long content identifiers.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
