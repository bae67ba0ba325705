//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use common::session::{ACCESS_TOKEN_COOKIE, access_token_cookie, cleared_access_token_cookie};
use common::users::User;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{AppState, session::IssuedSession};

/// Request for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub login: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Request for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Response for registration and login
#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Registration attempt for login: {}", payload.login);

    let session = state.sessions.register(payload).await?;

    let (jar, body) = session_response(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    info!("Login attempt for user: {}", payload.login);

    let session = state
        .sessions
        .login(&payload.login, &payload.password)
        .await?;

    let (jar, body) = session_response(&state, jar, session);
    Ok((StatusCode::OK, jar, body))
}

/// Logout endpoint; the cookie is cleared whatever the outcome
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    info!("Logout request");

    let token = jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned());
    let outcome = state
        .sessions
        .logout(token.as_deref())
        .await
        .map(|()| Json(serde_json::json!({"message": "Logged out successfully"})));

    (jar.add(cleared_access_token_cookie()), outcome).into_response()
}

fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: IssuedSession,
) -> (CookieJar, Json<SessionResponse>) {
    let cookie = access_token_cookie(
        session.access_token.clone(),
        state.sessions.access_token_ttl(),
    );
    let body = SessionResponse {
        token: session.access_token,
        user: session.user,
    };
    (jar.add(cookie), Json(body))
}

/// Custom error type for authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid login or password".to_string(),
            ),
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
