//! Request DTOs for the cache HTTP surface
//!
//! Defines query strings and JSON bodies accepted by the handlers. Content
//! itself travels as the raw request body.

use serde::Deserialize;

/// Query string for `PUT /cache/:key`
///
/// - `ttl`: TTL in seconds; omitted uses the default, `0` never expires
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetQuery {
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Request body for `POST /warm`
#[derive(Debug, Clone, Deserialize)]
pub struct WarmRequest {
    /// Content identifiers to warm
    pub keys: Vec<String>,
}

impl WarmRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.keys.is_empty() {
            return Some("At least one key is required".to_string());
        }
        None
    }
}

/// Request body for `POST /evict`
#[derive(Debug, Clone, Deserialize)]
pub struct EvictRequest {
    /// Maximum entries to evict
    pub count: usize,
}
