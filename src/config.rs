//! Configuration Module
//!
//! Handles loading and managing engine and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the local store can hold
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Local store TTL sweep interval in seconds
    pub cleanup_interval: u64,
    /// Durable backend connection URL, `None` runs local-only
    pub durable_url: Option<String>,
    /// Namespace prepended to every durable key
    pub durable_key_prefix: String,
    /// Upper bound for a single durable call, in milliseconds
    pub durable_timeout_ms: u64,
    /// Connection attempts made at startup
    pub durable_retries: u32,
    /// Interval between background liveness probes, in seconds
    pub health_probe_interval: u64,
    /// Keys warmed concurrently per batch
    pub warm_batch_size: usize,
    /// Pause between warm batches, in milliseconds
    pub warm_batch_delay_ms: u64,
    /// Maximum keys sampled by a preload
    pub preload_limit: usize,
    /// Memory pressure above which the monitor evicts
    pub pressure_threshold: f64,
    /// Entries evicted per monitor tick while above threshold
    pub pressure_evict_count: usize,
    /// Memory pressure check interval in seconds
    pub pressure_check_interval: u64,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum local entries (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 1)
    /// - `DURABLE_URL` - e.g. `redis://127.0.0.1:6379` (default: unset)
    /// - `DURABLE_KEY_PREFIX` - Durable key namespace (default: `cid-cache:`)
    /// - `DURABLE_TIMEOUT_MS` - Per-call timeout (default: 2000)
    /// - `DURABLE_RETRIES` - Startup connection attempts (default: 3)
    /// - `HEALTH_PROBE_INTERVAL` - Re-probe frequency in seconds (default: 10)
    /// - `WARM_BATCH_SIZE` - Warm batch size (default: 10)
    /// - `WARM_BATCH_DELAY_MS` - Delay between warm batches (default: 100)
    /// - `PRELOAD_LIMIT` - Keys sampled by preload (default: 50)
    /// - `PRESSURE_THRESHOLD` - Eviction trigger ratio (default: 0.9)
    /// - `PRESSURE_EVICT_COUNT` - Entries evicted per tick (default: 10)
    /// - `PRESSURE_CHECK_INTERVAL` - Monitor frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries).max(1),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            durable_url: env::var("DURABLE_URL").ok().filter(|v| !v.trim().is_empty()),
            durable_key_prefix: env::var("DURABLE_KEY_PREFIX")
                .unwrap_or(defaults.durable_key_prefix),
            durable_timeout_ms: env_or("DURABLE_TIMEOUT_MS", defaults.durable_timeout_ms),
            durable_retries: env_or("DURABLE_RETRIES", defaults.durable_retries),
            health_probe_interval: env_or("HEALTH_PROBE_INTERVAL", defaults.health_probe_interval),
            warm_batch_size: env_or("WARM_BATCH_SIZE", defaults.warm_batch_size),
            warm_batch_delay_ms: env_or("WARM_BATCH_DELAY_MS", defaults.warm_batch_delay_ms),
            preload_limit: env_or("PRELOAD_LIMIT", defaults.preload_limit),
            pressure_threshold: env_or("PRESSURE_THRESHOLD", defaults.pressure_threshold),
            pressure_evict_count: env_or("PRESSURE_EVICT_COUNT", defaults.pressure_evict_count),
            pressure_check_interval: env_or(
                "PRESSURE_CHECK_INTERVAL",
                defaults.pressure_check_interval,
            ),
        }
    }

    /// Per-call durable timeout as a Duration.
    pub fn durable_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_timeout_ms)
    }

    /// Inter-batch warm delay as a Duration.
    pub fn warm_batch_delay(&self) -> Duration {
        Duration::from_millis(self.warm_batch_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 3600,
            server_port: 3000,
            cleanup_interval: 1,
            durable_url: None,
            durable_key_prefix: "cid-cache:".to_string(),
            durable_timeout_ms: 2000,
            durable_retries: 3,
            health_probe_interval: 10,
            warm_batch_size: 10,
            warm_batch_delay_ms: 100,
            preload_limit: 50,
            pressure_threshold: 0.9,
            pressure_evict_count: 10,
            pressure_check_interval: 30,
        }
    }
}
