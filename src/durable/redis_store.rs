//! Redis-backed durable store.
//!
//! Holds one long-lived `ConnectionManager`, established lazily and shared by
//! every call. The manager reconnects on its own once created.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{DurableStore, MemoryInfo};
use crate::error::{DurableError, DurableResult};

/// Keys requested per SCAN round trip.
const SCAN_COUNT: usize = 200;

/// Base delay between startup connection attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

// == Redis Store ==
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
    namespace: String,
    connect_timeout: Duration,
}

impl RedisStore {
    /// Parses the URL without connecting.
    pub fn open(url: &str, namespace: impl Into<String>, connect_timeout: Duration) -> DurableResult<Self> {
        let client = Client::open(url).map_err(|e| DurableError::Protocol(e.to_string()))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            namespace: namespace.into(),
            connect_timeout,
        })
    }

    /// Establishes the shared connection, trying up to `attempts` times.
    pub async fn connect(&self, attempts: u32) -> DurableResult<()> {
        let attempts = attempts.max(1);
        let mut last_error = DurableError::Connection("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.connection().await {
                Ok(_) => {
                    info!("Connected to durable backend (attempt {}/{})", attempt, attempts);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "Durable backend connection attempt {}/{} failed: {}",
                        attempt, attempts, err
                    );
                    last_error = err;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }

        Err(last_error)
    }

    async fn connection(&self) -> DurableResult<ConnectionManager> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await
        .map_err(|_| DurableError::Timeout(self.connect_timeout))??;

        *guard = Some(conn.clone());
        Ok(conn)
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }
}

/// Escapes glob metacharacters so a prefix matches literally in SCAN MATCH.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Extracts `used_memory` and `maxmemory` from an `INFO memory` reply.
fn parse_memory_info(info: &str) -> DurableResult<MemoryInfo> {
    let field = |name: &str| -> Option<u64> {
        info.lines()
            .filter_map(|line| line.trim().split_once(':'))
            .find(|(k, _)| *k == name)
            .and_then(|(_, v)| v.trim().parse().ok())
    };

    let used_bytes = field("used_memory")
        .ok_or_else(|| DurableError::Protocol("INFO reply lacks used_memory".to_string()))?;
    Ok(MemoryInfo {
        used_bytes,
        max_bytes: field("maxmemory").unwrap_or(0),
    })
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> DurableResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl_seconds: u64) -> DurableResult<()> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.namespaced(key)).arg(value);
        if ttl_seconds > 0 {
            cmd.arg("EX").arg(ttl_seconds);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> DurableResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        let removed: u64 = redis::cmd("DEL").arg(namespaced).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> DurableResult<bool> {
        let mut conn = self.connection().await?;
        let count: u64 = redis::cmd("EXISTS")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await?;
        Ok(count > 0)
    }

    async fn persist(&self, key: &str) -> DurableResult<bool> {
        let mut conn = self.connection().await?;
        let changed: i64 = redis::cmd("PERSIST")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await?;
        Ok(changed == 1)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> DurableResult<bool> {
        let mut conn = self.connection().await?;
        let changed: i64 = redis::cmd("EXPIRE")
            .arg(self.namespaced(key))
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(changed == 1)
    }

    async fn ttl_remaining_ms(&self, key: &str) -> DurableResult<Option<u64>> {
        let mut conn = self.connection().await?;
        // -2 = missing, -1 = no expiry
        let pttl: i64 = redis::cmd("PTTL")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await?;
        Ok(u64::try_from(pttl).ok())
    }

    async fn ping(&self) -> DurableResult<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(DurableError::Protocol(format!("unexpected PING reply: {}", reply)));
        }
        Ok(())
    }

    async fn keys_matching(&self, prefix: &str) -> DurableResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", escape_glob(&self.namespaced(prefix)));
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            keys.extend(
                batch
                    .into_iter()
                    .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string)),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        debug!("SCAN {} returned {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn memory_info(&self) -> DurableResult<MemoryInfo> {
        let mut conn = self.connection().await?;
        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;
        parse_memory_info(&info)
    }
}
