//! API Handlers
//!
//! HTTP request handlers mapping each endpoint onto a cache engine operation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::CachedContent;
use crate::config::Config;
use crate::engine::{CacheEngine, EngineStats, HealthReport, WarmReport};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, EvictRequest, EvictResponse, PinResponse, PressureResponse,
    SetQuery, SetResponse, WarmRequest,
};

/// Content type assumed when a PUT carries none.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process's single engine instance
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }

    /// State over a local-only engine built from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CacheEngine::local_only(config)))
    }
}

/// Handler for PUT /cache/:key
///
/// Stores the raw request body under the key. The `Content-Type` header is
/// kept with the payload.
pub async fn put_content_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SetQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SetResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let content = CachedContent::new(body.to_vec(), content_type);
    let size = content.size;
    state.engine.set(&key, content, query.ttl).await?;

    Ok(Json(SetResponse::new(key, size)))
}

/// Handler for GET /cache/:key
///
/// Returns the cached bytes with their original content type.
pub async fn get_content_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let content = state
        .engine
        .get(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    let content_type = HeaderValue::from_str(&content.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let cached_at = HeaderValue::from_str(&content.cached_at.to_rfc3339())
        .map_err(|e| CacheError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::HeaderName::from_static("x-cached-at"), cached_at),
        ],
        content.data,
    )
        .into_response())
}

/// Handler for DELETE /cache/:key
pub async fn delete_content_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let existed = state.engine.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key, existed)))
}

/// Handler for POST /cache/:key/pin
///
/// Pinning an uncached key is not an error; the response reports `pinned: false`.
pub async fn pin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    let pinned = state.engine.pin(&key).await?;
    Ok(Json(PinResponse::new(key, pinned, pinned)))
}

/// Handler for DELETE /cache/:key/pin
pub async fn unpin_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    let changed = state.engine.unpin(&key).await?;
    Ok(Json(PinResponse::new(key, false, changed)))
}

/// Handler for GET /cache/:key/pin
pub async fn pin_status_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PinResponse>> {
    let pinned = state.engine.is_pinned(&key).await?;
    Ok(Json(PinResponse::new(key, pinned, false)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::new(state.engine.clear().await))
}

/// Handler for POST /warm
pub async fn warm_handler(
    State(state): State<AppState>,
    Json(req): Json<WarmRequest>,
) -> Result<Json<WarmReport>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    Ok(Json(state.engine.warm_cache(req.keys).await))
}

/// Handler for POST /preload
pub async fn preload_handler(State(state): State<AppState>) -> Json<WarmReport> {
    Json(state.engine.preload_popular_content().await)
}

/// Handler for POST /evict
pub async fn evict_handler(
    State(state): State<AppState>,
    Json(req): Json<EvictRequest>,
) -> Json<EvictResponse> {
    let evicted = state.engine.evict_least_used(req.count).await;
    Json(EvictResponse { evicted })
}

/// Handler for GET /pressure
pub async fn pressure_handler(State(state): State<AppState>) -> Json<PressureResponse> {
    Json(PressureResponse {
        memory_pressure: state.engine.memory_pressure().await,
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.get_stats().await)
}

/// Handler for GET /health
///
/// Always 200: a degraded cache still serves, the body says which backend.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.engine.health_check().await)
}
