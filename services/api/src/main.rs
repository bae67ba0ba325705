use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

mod error;
mod middleware;
mod models;
mod profiles;
mod repositories;
mod routes;
mod scoring;
mod state;
mod test_cache;

#[cfg(test)]
mod tests;

use common::{
    cache::{CacheStore, MemoryCacheStore, RedisCacheStore, RedisConfig},
    config::ServerConfig,
    database::{DatabaseConfig, init_pool, run_migrations},
    jwt::{JwtConfig, JwtService},
    users::PgUserRepository,
};
use tokio::net::TcpListener;

use crate::{repositories::PgTestRepository, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init();

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    let jwt_service = Arc::new(JwtService::new(JwtConfig::from_env()?));

    // The cache is an optimisation; run without Redis rather than not at all
    let redis_config = RedisConfig::from_env();
    let cache: Arc<dyn CacheStore> = match RedisCacheStore::connect(&redis_config).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Redis unavailable ({}), falling back to in-memory cache", e);
            Arc::new(MemoryCacheStore::new())
        }
    };

    let test_repository = Arc::new(PgTestRepository::new(pool.clone()));
    let user_repository = Arc::new(PgUserRepository::new(pool));

    let app_state = AppState::new(
        test_repository.clone(),
        test_repository,
        user_repository.clone(),
        user_repository,
        cache,
        jwt_service,
        redis_config.ttl,
    );

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let server_config = ServerConfig::from_env("API", 3001)?;
    let listener = TcpListener::bind(server_config.bind_address()).await?;
    info!("API service listening on {}", server_config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
