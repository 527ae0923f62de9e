//! Response DTOs for the cache HTTP surface
//!
//! Engine reports (`EngineStats`, `HealthReport`, `WarmReport`) serialize
//! directly; the types here cover the remaining endpoints.

use serde::Serialize;

/// Response body for `PUT /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
    pub size: u64,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' cached successfully", key),
            key,
            size,
        }
    }
}

/// Response body for `DELETE /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
    /// Whether anything was removed; false on a repeated delete
    pub existed: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, existed: bool) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
            existed,
        }
    }
}

/// Response body for the pin endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PinResponse {
    pub key: String,
    /// Pin state after the request
    pub pinned: bool,
    /// Whether the request changed anything
    pub changed: bool,
}

impl PinResponse {
    pub fn new(key: impl Into<String>, pinned: bool, changed: bool) -> Self {
        Self {
            key: key.into(),
            pinned,
            changed,
        }
    }
}

/// Response body for `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub removed: usize,
}

impl ClearResponse {
    pub fn new(removed: usize) -> Self {
        Self {
            message: "Cache cleared".to_string(),
            removed,
        }
    }
}

/// Response body for `POST /evict`
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    pub evicted: Vec<String>,
}

/// Response body for `GET /pressure`
#[derive(Debug, Clone, Serialize)]
pub struct PressureResponse {
    pub memory_pressure: f64,
}
