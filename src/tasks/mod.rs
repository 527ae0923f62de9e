//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the engine's lifetime.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired local entries at configured intervals
//! - Health Probe: Re-probes the durable backend so degraded mode can end
//! - Pressure Monitor: Evicts entries while memory pressure is too high

mod cleanup;
mod health_probe;
mod pressure;

pub use cleanup::spawn_cleanup_task;
pub use health_probe::spawn_health_probe;
pub use pressure::spawn_pressure_monitor;
