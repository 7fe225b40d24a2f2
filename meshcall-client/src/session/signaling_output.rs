use crate::error::ClientError;
use async_trait::async_trait;
use meshcall_core::{ConnectionId, Signal};

/// Outbound path for negotiation messages, shared by every session of a client.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Sends `signal` to the participant `to`.
    async fn send_signal(&self, to: ConnectionId, signal: Signal) -> Result<(), ClientError>;
}
