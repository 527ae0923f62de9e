//! CID Cache - a two-tier content cache for content-addressed data
//!
//! Serves content from a durable shared store when it is reachable and
//! falls back to a bounded in-process cache when it is not.

pub mod api;
pub mod cache;
pub mod config;
pub mod durable;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use engine::CacheEngine;
