//! Cache module for the quiz platform
//!
//! This module defines the [`CacheStore`] port used by the read paths of the
//! api service, together with a Redis-backed implementation and an in-memory
//! one. Every value is a serialized string stored under a deterministic key
//! (see [`keys`]) with a TTL.
//!
//! Cache failures are reported as [`CacheError`] so that callers can log
//! them, but callers never let them fail a request.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheResult;

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryCacheStore;
pub use self::redis::{RedisCacheStore, RedisConfig};
pub use crate::error::CacheError;

/// TTL applied to every cached test payload unless overridden by configuration
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Key-value store with TTL and pattern-based bulk delete
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value by key
    ///
    /// Returns `Ok(Some(value))` on a hit and `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value with a TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a single key
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob pattern, returning how many were removed
    async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> CacheResult<bool>;

    /// Short name of the backend, used in logs
    fn backend_name(&self) -> &'static str;
}
