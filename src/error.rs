//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.
//!
//! Two families exist. [`CacheError`] is the only error a caller of the engine
//! ever sees. [`DurableError`] describes durable backend failures and never
//! leaves the `durable` boundary as an error: it is logged and turned into a
//! degraded-mode fallback instead.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Caller-visible error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in cache (HTTP surface only, the engine returns `None`)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Local store is full and every resident entry is pinned
    #[error("Cache capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::InvalidKey(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::CapacityExhausted(msg) => (StatusCode::INSUFFICIENT_STORAGE, msg.clone()),
            CacheError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Durable Error Enum ==
/// Failure talking to the durable backend.
#[derive(Error, Debug)]
pub enum DurableError {
    /// Connection refused, reset or not yet established
    #[error("connection error: {0}")]
    Connection(String),

    /// Call did not complete within the configured bound
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered with something we could not interpret
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Stored value could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// Backend is switched off (in-process backend only)
    #[error("backend unavailable")]
    Unavailable,
}

impl From<redis::RedisError> for DurableError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            DurableError::Timeout(Duration::ZERO)
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            DurableError::Connection(err.to_string())
        } else {
            DurableError::Protocol(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DurableError {
    fn from(err: serde_json::Error) -> Self {
        DurableError::Codec(err.to_string())
    }
}

// == Result Type Aliases ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type for durable backend calls.
pub type DurableResult<T> = std::result::Result<T, DurableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_maps_to_bad_request() {
        let response = CacheError::InvalidKey("empty".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = CacheError::NotFound("cid-1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_capacity_exhausted_maps_to_507() {
        let response = CacheError::CapacityExhausted("all pinned".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INSUFFICIENT_STORAGE);
    }

    #[test]
    fn test_durable_error_display() {
        let err = DurableError::Timeout(Duration::from_millis(1500));
        assert!(err.to_string().contains("1.5s"));
        assert_eq!(DurableError::Unavailable.to_string(), "backend unavailable");
    }
}
