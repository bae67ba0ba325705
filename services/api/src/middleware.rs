//! Rolling-refresh authentication middleware
//!
//! Runs [`SessionRefresher`](common::session::SessionRefresher) in front of
//! every `/api` route. On success the caller's login is placed in the request
//! extensions as [`CurrentUser`]; when the access token was rotated, the new
//! one is set on the response cookie. Every unauthorized outcome clears the
//! cookie.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use common::session::{
    ACCESS_TOKEN_COOKIE, CurrentUser, access_token_cookie, cleared_access_token_cookie,
};
use tracing::{error, warn};

use crate::{error::ApiError, state::AppState};

/// Authenticate the request, rotating the access token when it has expired
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = jar
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned());

    let session = match state.sessions.authorize(token.as_deref()).await {
        Ok(session) => session,
        Err(e) if e.is_unauthorized() => {
            warn!(reason = %e, path = %req.uri().path(), "Request not authorized");
            return (jar.add(cleared_access_token_cookie()), ApiError::Unauthorized).into_response();
        }
        Err(e) => {
            error!("Failed to authorize request: {}", e);
            return ApiError::InternalServerError.into_response();
        }
    };

    req.extensions_mut().insert(CurrentUser {
        login: session.login,
    });
    let response = next.run(req).await;

    match session.rotated_access_token {
        Some(rotated) => {
            let cookie = access_token_cookie(rotated, state.sessions.access_token_ttl());
            (jar.add(cookie), response).into_response()
        }
        None => response,
    }
}
