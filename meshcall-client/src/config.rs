use crate::session::BackoffPolicy;
use meshcall_core::{IceServerConfig, RoomId, UserId};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_WELCOME_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-peer session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub backoff: BackoffPolicy,
    /// A session not healthy by then is treated as failed.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url of the signaling endpoint, e.g. `ws://localhost:3001/ws`.
    pub signaling_url: String,
    pub user_id: UserId,
    /// Overrides the room reported by the user directory.
    pub room_id: Option<RoomId>,
    /// Overrides the ICE servers announced by the server.
    pub ice_servers: Option<Vec<IceServerConfig>>,
    pub session: SessionConfig,
    pub welcome_timeout: Duration,
}

impl ClientConfig {
    pub fn new(signaling_url: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        Self {
            signaling_url: signaling_url.into(),
            user_id: user_id.into(),
            room_id: None,
            ice_servers: None,
            session: SessionConfig::default(),
            welcome_timeout: DEFAULT_WELCOME_TIMEOUT,
        }
    }

    pub fn with_room(mut self, room_id: impl Into<RoomId>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = Some(ice_servers);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.session.backoff = backoff;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.connect_timeout = timeout;
        self
    }
}
