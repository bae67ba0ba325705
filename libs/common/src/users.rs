//! Users and their persisted refresh token
//!
//! The user row is the single place a refresh token lives: saving a new one
//! overwrites the previous, so a user has at most one live refresh token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseResult};

/// User entity
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The persisted refresh token, if one is set and non-empty
    pub fn live_refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// New user creation payload; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub password_hash: String,
}

/// Partial profile update; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl UserProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none()
    }
}

/// Read access to users
#[async_trait]
pub trait UserReader: Send + Sync {
    /// Find a user by login; an unknown login is `DatabaseError::NotFound`
    async fn get_user_by_login(&self, login: &str) -> DatabaseResult<User>;
}

/// Write access to users
#[async_trait]
pub trait UserWriter: Send + Sync {
    /// Insert a user; a taken login or email is `DatabaseError::Conflict`
    async fn create_user(&self, new_user: NewUser) -> DatabaseResult<User>;

    /// Apply a profile update and return the updated user; an unknown login
    /// is `DatabaseError::NotFound`
    async fn update_user(&self, login: &str, update: UserProfileUpdate) -> DatabaseResult<User>;
}

/// Persistence of the per-user refresh token
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store `token` as the user's refresh token, replacing any previous one
    async fn save_refresh_token(&self, login: &str, token: &str) -> DatabaseResult<()>;

    /// Clear the user's refresh token
    async fn delete_refresh_token(&self, login: &str) -> DatabaseResult<()>;
}

const USER_COLUMNS: &str =
    "id, login, email, name, avatar, password_hash, refresh_token, created_at";

/// PostgreSQL user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> User {
        User {
            id: row.get("id"),
            login: row.get("login"),
            email: row.get("email"),
            name: row.get("name"),
            avatar: row.get("avatar"),
            password_hash: row.get("password_hash"),
            refresh_token: row.get("refresh_token"),
            created_at: row.get("created_at"),
        }
    }

    async fn set_refresh_token(
        &self,
        operation: &'static str,
        login: &str,
        token: Option<&str>,
    ) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE login = $1")
            .bind(login)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::query(operation, e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user `{}`", login)));
        }
        Ok(())
    }
}

#[async_trait]
impl UserReader for PgUserRepository {
    async fn get_user_by_login(&self, login: &str) -> DatabaseResult<User> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login = $1"
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::query("get_user_by_login", e))?;

        row.as_ref()
            .map(Self::map_row)
            .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))
    }
}

#[async_trait]
impl UserWriter for PgUserRepository {
    async fn create_user(&self, new_user: NewUser) -> DatabaseResult<User> {
        info!(login = %new_user.login, "Creating new user");

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, login, email, name, avatar, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.login)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.avatar)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::query("create_user", e))?;

        Ok(Self::map_row(&row))
    }

    async fn update_user(&self, login: &str, update: UserProfileUpdate) -> DatabaseResult<User> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), avatar = COALESCE($3, avatar)
            WHERE login = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(login)
        .bind(&update.name)
        .bind(&update.avatar)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::query("update_user", e))?;

        row.as_ref()
            .map(Self::map_row)
            .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))
    }
}

#[async_trait]
impl RefreshTokenStore for PgUserRepository {
    async fn save_refresh_token(&self, login: &str, token: &str) -> DatabaseResult<()> {
        self.set_refresh_token("save_refresh_token", login, Some(token))
            .await
    }

    async fn delete_refresh_token(&self, login: &str) -> DatabaseResult<()> {
        self.set_refresh_token("delete_refresh_token", login, None)
            .await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use self::memory::MemoryUserRepository;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    /// In-memory user repository for tests
    #[derive(Clone, Default)]
    pub struct MemoryUserRepository {
        users: Arc<RwLock<HashMap<String, User>>>,
        lookups: Arc<AtomicUsize>,
    }

    impl MemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a user with the given login and return it
        pub async fn add_user(&self, login: &str) -> User {
            let user = User {
                id: Uuid::new_v4(),
                login: login.to_string(),
                email: format!("{}@example.com", login),
                name: login.to_string(),
                avatar: None,
                password_hash: String::new(),
                refresh_token: None,
                created_at: Utc::now(),
            };
            self.users
                .write()
                .await
                .insert(login.to_string(), user.clone());
            user
        }

        /// Current refresh token of `login`
        pub async fn refresh_token_of(&self, login: &str) -> Option<String> {
            self.users
                .read()
                .await
                .get(login)
                .and_then(|user| user.refresh_token.clone())
        }

        /// Number of `get_user_by_login` calls so far
        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserReader for MemoryUserRepository {
        async fn get_user_by_login(&self, login: &str) -> DatabaseResult<User> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.users
                .read()
                .await
                .get(login)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))
        }
    }

    #[async_trait]
    impl UserWriter for MemoryUserRepository {
        async fn create_user(&self, new_user: NewUser) -> DatabaseResult<User> {
            let mut users = self.users.write().await;
            let taken = users.contains_key(&new_user.login)
                || users.values().any(|u| u.email == new_user.email);
            if taken {
                return Err(DatabaseError::Conflict(format!(
                    "user `{}` already exists",
                    new_user.login
                )));
            }

            let user = User {
                id: Uuid::new_v4(),
                login: new_user.login,
                email: new_user.email,
                name: new_user.name,
                avatar: new_user.avatar,
                password_hash: new_user.password_hash,
                refresh_token: None,
                created_at: Utc::now(),
            };
            users.insert(user.login.clone(), user.clone());
            Ok(user)
        }

        async fn update_user(
            &self,
            login: &str,
            update: UserProfileUpdate,
        ) -> DatabaseResult<User> {
            let mut users = self.users.write().await;
            let user = users
                .get_mut(login)
                .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))?;
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(avatar) = update.avatar {
                user.avatar = Some(avatar);
            }
            Ok(user.clone())
        }
    }

    #[async_trait]
    impl RefreshTokenStore for MemoryUserRepository {
        async fn save_refresh_token(&self, login: &str, token: &str) -> DatabaseResult<()> {
            let mut users = self.users.write().await;
            let user = users
                .get_mut(login)
                .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))?;
            user.refresh_token = Some(token.to_string());
            Ok(())
        }

        async fn delete_refresh_token(&self, login: &str) -> DatabaseResult<()> {
            let mut users = self.users.write().await;
            let user = users
                .get_mut(login)
                .ok_or_else(|| DatabaseError::NotFound(format!("user `{}`", login)))?;
            user.refresh_token = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_refresh_token_is_not_live() {
        let mut user = User {
            id: Uuid::new_v4(),
            login: "alice".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            avatar: None,
            password_hash: String::new(),
            refresh_token: Some("  ".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(user.live_refresh_token(), None);

        user.refresh_token = Some("abc".to_string());
        assert_eq!(user.live_refresh_token(), Some("abc"));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            login: "alice".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            avatar: None,
            password_hash: "hash".to_string(),
            refresh_token: Some("token".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["login"], "alice");
    }

    #[tokio::test]
    async fn test_update_user_changes_only_given_fields() {
        let repo = MemoryUserRepository::new();
        repo.add_user("alice").await;

        let updated = repo
            .update_user(
                "alice",
                UserProfileUpdate {
                    name: None,
                    avatar: Some("https://cdn.example.com/a.png".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "alice");
        assert_eq!(updated.avatar.as_deref(), Some("https://cdn.example.com/a.png"));

        let err = repo
            .update_user("ghost", UserProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_saving_a_refresh_token_overwrites_the_previous_one() {
        let repo = MemoryUserRepository::new();
        repo.add_user("alice").await;

        repo.save_refresh_token("alice", "first").await.unwrap();
        repo.save_refresh_token("alice", "second").await.unwrap();
        assert_eq!(repo.refresh_token_of("alice").await.as_deref(), Some("second"));

        repo.delete_refresh_token("alice").await.unwrap();
        assert_eq!(repo.refresh_token_of("alice").await, None);
    }
}
