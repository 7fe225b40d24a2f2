pub mod channel;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod session;

pub use client::MeshClient;
pub use config::{ClientConfig, SessionConfig};
pub use directory::{StaticDirectory, UserDirectory, UserProfile};
pub use error::ClientError;
pub use media::{ConnectionFactory, LocalMedia, RtcConnectionFactory};
pub use orchestrator::{ClientEvent, LeaveReport};
pub use session::BackoffPolicy;
