use meshcall_core::{ConnectionId, Participant, TranscriptLine, UserId};

/// Notifications surfaced to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    PeerConnected(ConnectionId),
    PeerReconnecting {
        connection_id: ConnectionId,
        attempt: u32,
    },
    /// Reconnection to this peer was abandoned.
    ConnectionLost(ConnectionId),
    UserDisconnected(UserId),
    Transcript(TranscriptLine),
    ChannelClosed,
}
