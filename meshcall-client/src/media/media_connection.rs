use crate::error::ClientError;
use crate::media::LocalMedia;
use async_trait::async_trait;
use meshcall_core::{ConnectionId, IceCandidate, IceServerConfig, SessionDescription};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionKind {
    Offer,
    Answer,
}

/// Connectivity collapsed into the three bands sessions react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionHealth {
    Healthy,
    /// Transient loss; may recover on its own.
    Degraded,
    Failed,
}

/// Emitted by a media connection into its owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    NegotiationNeeded,
    LocalCandidate(IceCandidate),
    Health(ConnectionHealth),
}

/// One negotiated media link to a remote participant.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<(), ClientError>;

    /// Produces an offer and applies it as the local description. May be called
    /// again while the previous offer is unanswered.
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, ClientError>;

    /// Produces an answer and applies it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription, ClientError>;

    async fn set_remote_description(
        &self,
        kind: DescriptionKind,
        description: SessionDescription,
    ) -> Result<(), ClientError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ClientError>;

    async fn close(&self) -> Result<(), ClientError>;
}

/// Creates media connections and owns local capture.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Acquires local media. Failure is fatal to joining.
    async fn prepare(&self) -> Result<LocalMedia, ClientError>;

    async fn open(
        &self,
        remote: &ConnectionId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaConnection>, ClientError>;
}
