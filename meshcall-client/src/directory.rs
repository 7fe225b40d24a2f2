use crate::error::ClientError;
use async_trait::async_trait;
use meshcall_core::{RoomId, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub display_name: String,
}

/// Looks up who the local user is before joining a room.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, user_id: &UserId) -> Result<UserProfile, ClientError>;
}

/// In-memory directory for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    profiles: HashMap<UserId, UserProfile>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profiles.insert(profile.user_id.clone(), profile);
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn lookup(&self, user_id: &UserId) -> Result<UserProfile, ClientError> {
        self.profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| ClientError::Directory(format!("unknown user {user_id}")))
    }
}
