use anyhow::Result;
use std::sync::Arc;
use tracing::info;

mod routes;
mod session;
mod validation;

use common::{
    config::ServerConfig,
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    jwt::{JwtConfig, JwtService},
    users::PgUserRepository,
};
use tokio::net::TcpListener;

use crate::session::SessionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
}

#[tokio::main]
async fn main() -> Result<()> {
    common::telemetry::init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Initialize JWT service
    let jwt_service = Arc::new(JwtService::new(JwtConfig::from_env()?));

    let user_repository = Arc::new(PgUserRepository::new(pool));
    let sessions = SessionManager::new(
        user_repository.clone(),
        user_repository.clone(),
        user_repository,
        jwt_service,
    );

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(AppState { sessions });

    let server_config = ServerConfig::from_env("AUTH", 3000)?;
    let listener = TcpListener::bind(server_config.bind_address()).await?;
    info!(
        "Authentication service listening on {}",
        server_config.bind_address()
    );

    axum::serve(listener, app).await?;

    Ok(())
}
