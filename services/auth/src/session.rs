//! Account sessions: registration, login and logout
//!
//! A session is an access token handed to the client in the `token` cookie
//! plus a refresh token persisted on the user row. Registering or logging in
//! overwrites the stored refresh token, so only the latest session can be
//! rolled forward by the api service. Logging out clears it.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::error::DatabaseError;
use common::jwt::{TokenProvider, TokenType};
use common::users::{NewUser, RefreshTokenStore, User, UserReader, UserWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::routes::{AuthError, RegisterRequest};
use crate::validation::{validate_email, validate_login, validate_name, validate_password};

/// A freshly opened session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
}

/// Session manager for opening and closing user sessions
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserReader>,
    writer: Arc<dyn UserWriter>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    tokens: Arc<dyn TokenProvider>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        users: Arc<dyn UserReader>,
        writer: Arc<dyn UserWriter>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            users,
            writer,
            refresh_tokens,
            tokens,
        }
    }

    /// Lifetime of the access-token cookie
    pub fn access_token_ttl(&self) -> Duration {
        self.tokens.access_token_ttl()
    }

    /// Create an account and open its first session
    pub async fn register(&self, request: RegisterRequest) -> Result<IssuedSession, AuthError> {
        validate_login(&request.login).map_err(AuthError::Validation)?;
        validate_email(&request.email).map_err(AuthError::Validation)?;
        validate_password(&request.password).map_err(AuthError::Validation)?;
        validate_name(&request.name).map_err(AuthError::Validation)?;

        let password_hash = hash_password(&request.password)?;
        let user = self
            .writer
            .create_user(NewUser {
                login: request.login,
                email: request.email,
                name: request.name.trim().to_string(),
                avatar: request.avatar,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    AuthError::Conflict("Login or email is already taken".to_string())
                }
                other => {
                    error!("Failed to create user: {}", other);
                    AuthError::InternalServerError
                }
            })?;

        info!(login = %user.login, "User registered");
        self.open_session(user).await
    }

    /// Check credentials and open a new session
    ///
    /// An unknown login and a wrong password are indistinguishable to the caller.
    pub async fn login(&self, login: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let user = match self.users.get_user_by_login(login).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                warn!(login = %login, "Login attempt for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!("Failed to look up user: {}", e);
                return Err(AuthError::InternalServerError);
            }
        };

        if !verify_password(&user, password) {
            warn!(login = %login, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(login = %login, "User logged in");
        self.open_session(user).await
    }

    /// Close the session owning `access_token`
    ///
    /// The token may be expired but must carry a valid signature.
    pub async fn logout(&self, access_token: Option<&str>) -> Result<(), AuthError> {
        let access_token = access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let claims = self
            .tokens
            .decode_ignoring_expiry(access_token)
            .map_err(|e| {
                warn!("Logout with unusable token: {}", e);
                AuthError::Unauthorized
            })?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::Unauthorized);
        }

        self.refresh_tokens
            .delete_refresh_token(&claims.sub)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => AuthError::Unauthorized,
                other => {
                    error!("Failed to clear refresh token: {}", other);
                    AuthError::InternalServerError
                }
            })?;

        info!(login = %claims.sub, "User logged out");
        Ok(())
    }

    /// Mint both tokens and persist the refresh token, replacing any previous one
    async fn open_session(&self, user: User) -> Result<IssuedSession, AuthError> {
        let access_token = self.tokens.create_access_token(&user.login).map_err(|e| {
            error!("Failed to generate access token: {}", e);
            AuthError::InternalServerError
        })?;
        let refresh_token = self.tokens.create_refresh_token(&user.login).map_err(|e| {
            error!("Failed to generate refresh token: {}", e);
            AuthError::InternalServerError
        })?;

        self.refresh_tokens
            .save_refresh_token(&user.login, &refresh_token)
            .await
            .map_err(|e| {
                error!("Failed to store refresh token: {}", e);
                AuthError::InternalServerError
            })?;

        Ok(IssuedSession { user, access_token })
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            AuthError::InternalServerError
        })
}

fn verify_password(user: &User, password: &str) -> bool {
    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(login = %user.login, "Stored password hash is unreadable: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use common::jwt::{Claims, JwtConfig, JwtService, unix_now};
    use common::users::MemoryUserRepository;

    pub(crate) struct Fixture {
        pub users: MemoryUserRepository,
        pub jwt: Arc<JwtService>,
        pub sessions: SessionManager,
    }

    pub(crate) fn fixture() -> Fixture {
        let users = MemoryUserRepository::new();
        let jwt = Arc::new(JwtService::new(JwtConfig::with_secret("auth-test-secret")));
        let sessions = SessionManager::new(
            Arc::new(users.clone()),
            Arc::new(users.clone()),
            Arc::new(users.clone()),
            jwt.clone(),
        );
        Fixture {
            users,
            jwt,
            sessions,
        }
    }

    pub(crate) fn registration(login: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            login: login.to_string(),
            email: format!("{}@example.com", login),
            password: "wonderland42".to_string(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_register_opens_a_session() {
        let f = fixture();

        let session = f.sessions.register(registration("alice")).await.unwrap();

        assert_eq!(session.user.login, "alice");
        assert_ne!(session.user.password_hash, "wonderland42");
        let claims = f.jwt.verify_token(&session.access_token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.token_type, TokenType::Access);

        let refresh = f.users.refresh_token_of("alice").await.unwrap();
        let claims = f.jwt.verify_token(&refresh).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[tokio::test]
    async fn test_register_rejects_taken_login() {
        let f = fixture();
        f.sessions.register(registration("alice")).await.unwrap();

        let mut again = registration("alice");
        again.email = "other@example.com".to_string();
        let err = f.sessions.register(again).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let f = fixture();
        let mut request = registration("alice");
        request.email = "not-an-email".to_string();

        let err = f.sessions.register(request).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_replaces_the_refresh_token() {
        let f = fixture();
        f.sessions.register(registration("alice")).await.unwrap();
        let first = f.users.refresh_token_of("alice").await.unwrap();

        // Tokens minted within the same second are identical; wait one out.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let session = f.sessions.login("alice", "wonderland42").await.unwrap();
        assert_eq!(session.user.login, "alice");

        let second = f.users.refresh_token_of("alice").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture();
        f.sessions.register(registration("alice")).await.unwrap();

        let wrong_password = f.sessions.login("alice", "queenofhearts1").await.unwrap_err();
        let unknown_user = f.sessions.login("bob", "wonderland42").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_logout_with_expired_token_clears_refresh_token() {
        let f = fixture();
        f.sessions.register(registration("alice")).await.unwrap();

        let now = unix_now().unwrap();
        let expired = f
            .jwt
            .encode_claims(&Claims {
                sub: "alice".to_string(),
                iat: now - 7200,
                exp: now - 3600,
                token_type: TokenType::Access,
            })
            .unwrap();

        f.sessions.logout(Some(&expired)).await.unwrap();
        assert_eq!(f.users.refresh_token_of("alice").await, None);
    }

    #[tokio::test]
    async fn test_logout_requires_a_signed_access_token() {
        let f = fixture();
        f.sessions.register(registration("alice")).await.unwrap();

        assert!(matches!(
            f.sessions.logout(None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            f.sessions.logout(Some("garbage")).await,
            Err(AuthError::Unauthorized)
        ));

        let refresh = f.users.refresh_token_of("alice").await.unwrap();
        assert!(matches!(
            f.sessions.logout(Some(&refresh)).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(f.users.refresh_token_of("alice").await.is_some());
    }
}
