//! Cache-aside reads and updates of user profiles
//!
//! Profiles are cached under `user:login:{login}`. An update goes to the
//! repository first and then drops the key, so the next read repopulates it.

use common::cache::{CacheStore, keys};
use common::users::{UserReader, UserWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{UpdateProfileRequest, UserProfile};

#[derive(Clone)]
pub struct ProfileCache {
    users: Arc<dyn UserReader>,
    writer: Arc<dyn UserWriter>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(
        users: Arc<dyn UserReader>,
        writer: Arc<dyn UserWriter>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            users,
            writer,
            cache,
            ttl,
        }
    }

    /// Public profile of `login`; an unknown login is `NotFound`
    pub async fn find_by_login(&self, login: &str) -> ApiResult<UserProfile> {
        let key = keys::user_profile(login);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(profile) => return Ok(profile),
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping corrupted cache entry");
                    self.invalidate(&key).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, falling back to repository"),
        }

        let profile = UserProfile::from(self.users.get_user_by_login(login).await?);

        match serde_json::to_string(&profile) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, &raw, self.ttl).await {
                    warn!(key = %key, error = %e, "Cache write failed, skipping");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize cache entry"),
        }
        Ok(profile)
    }

    /// Update the caller's own profile
    ///
    /// An empty update changes nothing and returns the current profile.
    pub async fn update(&self, login: &str, request: UpdateProfileRequest) -> ApiResult<UserProfile> {
        let update = request.into_update().map_err(ApiError::BadRequest)?;
        if update.is_empty() {
            debug!(login = %login, "Empty profile update");
            return self.find_by_login(login).await;
        }

        let user = self.writer.update_user(login, update).await?;
        self.invalidate(&keys::user_profile(login)).await;

        info!(login = %login, "Profile updated");
        Ok(UserProfile::from(user))
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key = key, error = %e, "Cache delete failed");
        }
    }
}
