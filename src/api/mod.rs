//! API Module
//!
//! Thin HTTP surface over the cache engine.
//!
//! # Endpoints
//! - `PUT /cache/:key`, `GET /cache/:key`, `DELETE /cache/:key`
//! - `POST /cache/:key/pin`, `DELETE /cache/:key/pin`, `GET /cache/:key/pin`
//! - `DELETE /cache`
//! - `POST /warm`, `POST /preload`, `POST /evict`, `GET /pressure`
//! - `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
