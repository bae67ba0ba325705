//! Custom error types for the common library
//!
//! This module defines the error kinds shared by the services: failures of
//! the durable store and failures of the cache backend. Cache errors are
//! never surfaced to API callers; they are logged and the caller falls back
//! to the database.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// PostgreSQL error code for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error in {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: SqlxError,
    },

    /// The requested row does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Wrap a query failure with the name of the repository operation
    pub fn query(operation: &'static str, source: SqlxError) -> Self {
        if let Some(db_error) = source.as_database_error() {
            if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return DatabaseError::Conflict(format!("{operation}: {db_error}"));
            }
        }
        DatabaseError::Query { operation, source }
    }

    /// Whether this error means the row is absent rather than the store failing
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by a cache backend
///
/// Callers treat every variant as a degraded cache: log it and continue
/// against the source of truth.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to reach the cache backend
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed a command
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A cached payload could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            CacheError::Connection(e.to_string())
        } else {
            CacheError::Backend(e.to_string())
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
