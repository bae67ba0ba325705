//! Common library for the quiz platform services
//!
//! This crate holds what the `auth` and `api` services share: typed errors,
//! the PostgreSQL pool, the cache store port with its Redis and in-memory
//! adapters, JWT issuing and verification, the user repository, and the
//! rolling session refresher that guards every protected request.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod jwt;
pub mod session;
pub mod telemetry;
pub mod users;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, health_check};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
