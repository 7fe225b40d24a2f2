mod participant;
mod room;
mod signaling;

pub use participant::{ConnectionId, Participant, UserId};
pub use room::RoomId;
pub use signaling::{
    ClientMessage, IceCandidate, IceServerConfig, JoinRequest, ServerMessage, SessionDescription,
    Signal, SignalKind, TranscriptLine,
};
