//! Redis cache store
//!
//! This module provides the Redis connection configuration and a
//! [`CacheStore`] implementation over a shared, auto-reconnecting
//! [`ConnectionManager`].
//! Pattern deletes iterate with `SCAN` so they never block the server the
//! way `KEYS` would.

use async_trait::async_trait;
use ::redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, info};

use super::{CacheStore, DEFAULT_CACHE_TTL};
use crate::error::{CacheError, CacheResult};

/// Keys requested per `SCAN` round trip
const SCAN_BATCH: usize = 100;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// TTL applied to cached test payloads
    pub ttl: Duration,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `CACHE_TTL_SECONDS`: TTL of cached test payloads (default: 600)
    pub fn from_env() -> Self {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let ttl = std::env::var("CACHE_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);

        RedisConfig { url, ttl }
    }
}

/// Redis-backed cache store
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheStore {
    /// Open a managed connection and verify the server answers
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {}", e)))?;
        let connection = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Connection(format!("Failed to connect to Redis: {}", e))
        })?;
        let store = RedisCacheStore { connection };

        if !store.health_check().await? {
            return Err(CacheError::Connection(
                "Redis did not answer PING".to_string(),
            ));
        }

        info!(url = %redact_url(&config.url), "Redis cache store connected");
        Ok(store)
    }

    /// Handle to the shared connection; clones multiplex over one socket
    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(key).await?;

        if value.is_some() {
            debug!(key = key, "Cache HIT");
        } else {
            debug!(key = key, "Cache MISS");
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection();
        let ttl_seconds = ttl.as_secs().max(1);

        let _: () = conn.set_ex(key, value, ttl_seconds).await?;

        debug!(key = key, ttl_seconds = ttl_seconds, "Cache SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection();
        let _: u64 = conn.del(key).await?;

        debug!(key = key, "Cache DEL");
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection();
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let count: u64 = conn.del(&keys).await?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = pattern, deleted = deleted, "Cache pattern DEL");
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.connection();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Redact credentials from a Redis URL for logging
fn redact_url(url: &str) -> String {
    let authority = url.find("://").map(|i| i + 3).unwrap_or(0);
    if let Some(at_pos) = url[authority..].find('@').map(|i| i + authority) {
        if let Some(colon_pos) = url[authority..at_pos].rfind(':').map(|i| i + authority) {
            return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
