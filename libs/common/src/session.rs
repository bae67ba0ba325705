//! Rolling session refresh
//!
//! [`SessionRefresher`] is the authentication gate run in front of every
//! protected request. A valid access token passes through untouched. An
//! expired (or otherwise failing) access token is traded for a new one using
//! the refresh token persisted on the user row, so clients never call a
//! dedicated refresh endpoint.
//!
//! The refresh token itself is never rotated here; only logout clears it.
//! Two concurrent requests near expiry may both mint a new access token;
//! both are valid and the client keeps whichever cookie it received last.

use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::jwt::{TokenError, TokenProvider, TokenType};
use crate::users::UserReader;

/// Name of the cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "token";

/// Reasons a request could not be authenticated
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no access token cookie")]
    MissingToken,

    #[error("access token cannot be attributed to a user: {0}")]
    MalformedToken(#[source] TokenError),

    #[error("expected an access token, got a {0:?} token")]
    WrongTokenType(TokenType),

    #[error("refresh token lookup failed: {0}")]
    RefreshLookupFailed(#[source] DatabaseError),

    #[error("user `{0}` has no refresh token")]
    RefreshMissing(String),

    #[error("refresh token rejected: {0}")]
    RefreshInvalid(String),

    #[error("failed to mint access token: {0}")]
    Issue(#[source] TokenError),
}

impl SessionError {
    /// Whether the caller must re-authenticate (as opposed to a server fault)
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, SessionError::Issue(_))
    }
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Login of the caller
    pub login: String,
    /// Newly minted access token, present when the presented one was stale
    pub rotated_access_token: Option<String>,
}

/// Identity of the caller, placed in request extensions by the middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub login: String,
}

/// Authenticates requests and rolls the access token forward
#[derive(Clone)]
pub struct SessionRefresher {
    users: Arc<dyn UserReader>,
    tokens: Arc<dyn TokenProvider>,
}

impl SessionRefresher {
    /// Create a new session refresher
    pub fn new(users: Arc<dyn UserReader>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { users, tokens }
    }

    /// Lifetime given to the rotated access-token cookie
    pub fn access_token_ttl(&self) -> Duration {
        self.tokens.access_token_ttl()
    }

    /// Authenticate a request from the value of its access-token cookie
    pub async fn authorize(
        &self,
        access_token: Option<&str>,
    ) -> Result<AuthenticatedSession, SessionError> {
        let access_token = access_token
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::MissingToken)?;

        let verification = self.tokens.verify_token(access_token);
        match verification {
            Ok(claims) if claims.token_type == TokenType::Access => {
                return Ok(AuthenticatedSession {
                    login: claims.sub,
                    rotated_access_token: None,
                });
            }
            Ok(claims) => return Err(SessionError::WrongTokenType(claims.token_type)),
            Err(e) => debug!(error = %e, "Access token rejected, attempting refresh"),
        }

        let claims = self
            .tokens
            .decode_ignoring_expiry(access_token)
            .map_err(SessionError::MalformedToken)?;
        if claims.token_type != TokenType::Access {
            return Err(SessionError::WrongTokenType(claims.token_type));
        }
        let login = claims.sub;

        let user = self
            .users
            .get_user_by_login(&login)
            .await
            .map_err(SessionError::RefreshLookupFailed)?;

        let refresh_token = user
            .live_refresh_token()
            .ok_or_else(|| SessionError::RefreshMissing(login.clone()))?;

        let refresh_claims = self
            .tokens
            .verify_token(refresh_token)
            .map_err(|e| SessionError::RefreshInvalid(e.to_string()))?;

        if refresh_claims.token_type != TokenType::Refresh {
            return Err(SessionError::RefreshInvalid(
                "persisted token is not a refresh token".to_string(),
            ));
        }
        if refresh_claims.sub != login {
            warn!(login = %login, "Persisted refresh token belongs to another login");
            return Err(SessionError::RefreshInvalid(
                "refresh token subject mismatch".to_string(),
            ));
        }

        let rotated = self
            .tokens
            .create_access_token(&refresh_claims.sub)
            .map_err(SessionError::Issue)?;

        info!(login = %refresh_claims.sub, "Access token rotated");
        Ok(AuthenticatedSession {
            login: refresh_claims.sub,
            rotated_access_token: Some(rotated),
        })
    }
}

/// Build the HttpOnly cookie carrying an access token
pub fn access_token_cookie(token: String, ttl: Duration) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

/// Expired, empty access-token cookie that makes the client drop its copy
pub fn cleared_access_token_cookie() -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{Claims, JwtConfig, JwtService, unix_now};
    use crate::users::{MemoryUserRepository, RefreshTokenStore};

    struct Fixture {
        users: MemoryUserRepository,
        jwt: Arc<JwtService>,
        refresher: SessionRefresher,
    }

    fn fixture() -> Fixture {
        let users = MemoryUserRepository::new();
        let jwt = Arc::new(JwtService::new(JwtConfig::with_secret("session-secret")));
        let refresher = SessionRefresher::new(Arc::new(users.clone()), jwt.clone());
        Fixture {
            users,
            jwt,
            refresher,
        }
    }

    fn expired_token(jwt: &JwtService, login: &str, token_type: TokenType) -> String {
        let now = unix_now().unwrap();
        jwt.encode_claims(&Claims {
            sub: login.to_string(),
            iat: now - 7200,
            exp: now - 3600,
            token_type,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_cookie_is_unauthorized() {
        let f = fixture();

        let err = f.refresher.authorize(None).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingToken));
        assert!(err.is_unauthorized());

        let err = f.refresher.authorize(Some("")).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingToken));
    }

    #[tokio::test]
    async fn test_valid_access_token_passes_without_rotation() {
        let f = fixture();
        let token = f.jwt.create_access_token("alice").unwrap();

        let session = f.refresher.authorize(Some(&token)).await.unwrap();
        assert_eq!(session.login, "alice");
        assert_eq!(session.rotated_access_token, None);
        // No repository round trip on the fast path.
        assert_eq!(f.users.lookups(), 0);
    }

    #[tokio::test]
    async fn test_expired_access_token_is_rotated_with_persisted_refresh_token() {
        let f = fixture();
        f.users.add_user("alice").await;
        let refresh = f.jwt.create_refresh_token("alice").unwrap();
        f.users.save_refresh_token("alice", &refresh).await.unwrap();

        let stale = expired_token(&f.jwt, "alice", TokenType::Access);
        let before = unix_now().unwrap();
        let session = f.refresher.authorize(Some(&stale)).await.unwrap();

        assert_eq!(session.login, "alice");
        let rotated = session.rotated_access_token.expect("token should rotate");
        let claims = f.jwt.verify_token(&rotated).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp >= before + 15 * 60);
        assert!(claims.exp <= unix_now().unwrap() + 15 * 60);

        // The refresh token is never rotated by the gate.
        assert_eq!(f.users.refresh_token_of("alice").await, Some(refresh));
    }

    #[tokio::test]
    async fn test_access_token_just_past_expiry_is_rotated() {
        let f = fixture();
        f.users.add_user("alice").await;
        let refresh = f.jwt.create_refresh_token("alice").unwrap();
        f.users.save_refresh_token("alice", &refresh).await.unwrap();

        let now = unix_now().unwrap();
        let barely_stale = f
            .jwt
            .encode_claims(&Claims {
                sub: "alice".to_string(),
                iat: now - 930,
                exp: now - 30,
                token_type: TokenType::Access,
            })
            .unwrap();

        let session = f.refresher.authorize(Some(&barely_stale)).await.unwrap();
        assert!(session.rotated_access_token.is_some());
    }

    #[tokio::test]
    async fn test_expired_access_token_without_refresh_token_is_unauthorized() {
        let f = fixture();
        f.users.add_user("alice").await;

        let stale = expired_token(&f.jwt, "alice", TokenType::Access);
        let err = f.refresher.authorize(Some(&stale)).await.unwrap_err();
        assert!(matches!(err, SessionError::RefreshMissing(ref login) if login == "alice"));
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthorized() {
        let f = fixture();

        let stale = expired_token(&f.jwt, "ghost", TokenType::Access);
        let err = f.refresher.authorize(Some(&stale)).await.unwrap_err();
        assert!(matches!(err, SessionError::RefreshLookupFailed(_)));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_unauthorized() {
        let f = fixture();
        f.users.add_user("alice").await;
        let refresh = expired_token(&f.jwt, "alice", TokenType::Refresh);
        f.users.save_refresh_token("alice", &refresh).await.unwrap();

        let stale = expired_token(&f.jwt, "alice", TokenType::Access);
        let err = f.refresher.authorize(Some(&stale)).await.unwrap_err();
        assert!(matches!(err, SessionError::RefreshInvalid(_)));
    }

    #[tokio::test]
    async fn test_persisted_access_token_is_not_accepted_as_refresh_token() {
        let f = fixture();
        f.users.add_user("alice").await;
        let not_refresh = f.jwt.create_access_token("alice").unwrap();
        f.users
            .save_refresh_token("alice", &not_refresh)
            .await
            .unwrap();

        let stale = expired_token(&f.jwt, "alice", TokenType::Access);
        let err = f.refresher.authorize(Some(&stale)).await.unwrap_err();
        assert!(matches!(err, SessionError::RefreshInvalid(_)));
    }

    #[tokio::test]
    async fn test_forged_token_cannot_ride_another_users_refresh_token() {
        let f = fixture();
        f.users.add_user("alice").await;
        let refresh = f.jwt.create_refresh_token("alice").unwrap();
        f.users.save_refresh_token("alice", &refresh).await.unwrap();

        let forger = JwtService::new(JwtConfig::with_secret("not-the-secret"));
        let forged = expired_token(&forger, "alice", TokenType::Access);

        let err = f.refresher.authorize(Some(&forged)).await.unwrap_err();
        assert!(matches!(err, SessionError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_in_access_cookie_is_refused() {
        let f = fixture();
        let refresh = f.jwt.create_refresh_token("alice").unwrap();

        let err = f.refresher.authorize(Some(&refresh)).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongTokenType(TokenType::Refresh)));
    }

    #[test]
    fn test_access_token_cookie_attributes() {
        let cookie = access_token_cookie("abc".to_string(), Duration::from_secs(900));
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("token=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=900"));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let rendered = cleared_access_token_cookie().to_string();

        assert!(rendered.starts_with("token=;"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=0"));
    }
}
