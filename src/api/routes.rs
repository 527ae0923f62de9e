//! API Routes
//!
//! Configures the Axum router with all cache endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_content_handler, evict_handler, get_content_handler, health_handler,
    pin_handler, pin_status_handler, preload_handler, pressure_handler, put_content_handler,
    stats_handler, unpin_handler, warm_handler, AppState,
};
use crate::cache::MAX_VALUE_SIZE;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache/:key` - Cache the request body (`?ttl=` seconds)
/// - `GET /cache/:key` - Fetch cached bytes
/// - `DELETE /cache/:key` - Delete content and pin
/// - `POST|DELETE|GET /cache/:key/pin` - Pin, unpin, query pin
/// - `DELETE /cache` - Clear both backends
/// - `POST /warm`, `POST /preload` - Batch warming
/// - `POST /evict`, `GET /pressure` - Eviction and memory pressure
/// - `GET /stats`, `GET /health` - Reporting and liveness
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache", delete(clear_handler))
        .route(
            "/cache/:key",
            put(put_content_handler)
                .get(get_content_handler)
                .delete(delete_content_handler),
        )
        .route(
            "/cache/:key/pin",
            post(pin_handler).delete(unpin_handler).get(pin_status_handler),
        )
        .route("/warm", post(warm_handler))
        .route("/preload", post(preload_handler))
        .route("/evict", post(evict_handler))
        .route("/pressure", get(pressure_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_VALUE_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
