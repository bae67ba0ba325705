//! Public user profile payloads

use common::users::{User, UserProfileUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted display name, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Longest accepted avatar URL, in characters
pub const MAX_AVATAR_LENGTH: usize = 2048;

/// What other users may see about a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub login: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            login: user.login,
            email: user.email,
            name: user.name,
            avatar: user.avatar,
        }
    }
}

/// Request for updating the caller's own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl UpdateProfileRequest {
    /// Check the request and turn it into a repository update
    pub fn into_update(self) -> Result<UserProfileUpdate, String> {
        let name = match self.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err("Name must not be blank".to_string());
                }
                if name.chars().count() > MAX_NAME_LENGTH {
                    return Err(format!("Name must be at most {} characters", MAX_NAME_LENGTH));
                }
                Some(name)
            }
            None => None,
        };

        if let Some(avatar) = &self.avatar {
            if avatar.chars().count() > MAX_AVATAR_LENGTH {
                return Err(format!(
                    "Avatar URL must be at most {} characters",
                    MAX_AVATAR_LENGTH
                ));
            }
        }

        Ok(UserProfileUpdate {
            name,
            avatar: self.avatar,
        })
    }
}
