use crate::room::{Room, RoomRegistry};
use crate::signaling::{DropReason, RelayOutcome};
use dashmap::DashMap;
use meshcall_core::{
    ConnectionId, IceServerConfig, JoinRequest, Participant, RoomId, ServerMessage, Signal,
    TranscriptLine,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

struct RouterInner {
    registry: Arc<RoomRegistry>,
    peers: DashMap<ConnectionId, PeerSender>,
    ice_servers: Vec<IceServerConfig>,
}

/// Routes server messages to connected participants.
///
/// Membership broadcasts are sent while the room entry is locked, so every
/// member observes membership snapshots in the same order they were produced.
#[derive(Clone)]
pub struct SignalingRouter {
    inner: Arc<RouterInner>,
}

impl SignalingRouter {
    pub fn new(registry: Arc<RoomRegistry>, ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registry,
                peers: DashMap::new(),
                ice_servers,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.inner.registry
    }

    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.inner.ice_servers
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    /// Registers a new channel, greets it with its connection id and joins it to the room.
    pub fn connect(&self, request: JoinRequest, tx: PeerSender) -> Participant {
        let participant = Participant {
            connection_id: ConnectionId::new(),
            user_id: request.user_id,
            display_name: request.display_name,
        };

        info!(
            "Participant {} ({}) connected to room {}",
            participant.connection_id, participant.display_name, request.room_id
        );

        let welcome = ServerMessage::Welcome {
            connection_id: participant.connection_id.clone(),
            ice_servers: self.inner.ice_servers.clone(),
        };
        if tx.send(welcome).is_err() {
            warn!(
                "Channel for {} closed before welcome",
                participant.connection_id
            );
        }
        self.inner
            .peers
            .insert(participant.connection_id.clone(), tx);

        self.inner
            .registry
            .join_with(&request.room_id, participant.clone(), |room| {
                self.broadcast_room(room)
            });

        participant
    }

    /// Removes a channel, notifies remaining members and re-broadcasts membership.
    pub fn disconnect(&self, room_id: &RoomId, connection_id: &ConnectionId) {
        self.inner.peers.remove(connection_id);

        let departed =
            self.inner
                .registry
                .leave_with(room_id, connection_id, |room, departed| {
                    let notice = ServerMessage::UserDisconnected {
                        user_id: departed.user_id.clone(),
                    };
                    for member in room.members() {
                        self.send_to(&member.connection_id, notice.clone());
                    }
                    self.broadcast_room(room);
                });

        match departed {
            Some(p) => info!(
                "Participant {} ({}) left room {}",
                p.connection_id, p.display_name, room_id
            ),
            None => debug!(
                "Disconnect for {} which was not in room {}",
                connection_id, room_id
            ),
        }
    }

    pub fn broadcast_members(&self, room_id: &RoomId) {
        self.inner
            .registry
            .with_room(room_id, |room| self.broadcast_room(room));
    }

    /// Delivers `signal` to `to` only when both ends are members of `room_id`.
    pub fn relay(
        &self,
        room_id: &RoomId,
        from: &ConnectionId,
        to: &ConnectionId,
        signal: Signal,
    ) -> RelayOutcome {
        let kind = signal.kind();

        let outcome = self
            .inner
            .registry
            .with_room(room_id, |room| {
                if !room.contains(from) {
                    return RelayOutcome::Dropped(DropReason::SenderNotInRoom);
                }
                if !room.contains(to) {
                    return RelayOutcome::Dropped(DropReason::TargetNotInRoom);
                }
                let msg = ServerMessage::Signal {
                    from: from.clone(),
                    signal,
                };
                if self.send_to(to, msg) {
                    RelayOutcome::Delivered
                } else {
                    RelayOutcome::Dropped(DropReason::ChannelClosed)
                }
            })
            .unwrap_or(RelayOutcome::Dropped(DropReason::UnknownRoom));

        match outcome {
            RelayOutcome::Delivered => debug!("Relayed {} {} -> {}", kind, from, to),
            RelayOutcome::Dropped(reason) => {
                debug!("Dropped {} {} -> {}: {}", kind, from, to, reason)
            }
        }
        outcome
    }

    /// Forwards a transcript line to every other member, returning how many received it.
    pub fn relay_transcript(
        &self,
        room_id: &RoomId,
        from: &ConnectionId,
        line: TranscriptLine,
    ) -> usize {
        self.inner
            .registry
            .with_room(room_id, |room| {
                if !room.contains(from) {
                    return 0;
                }
                let mut delivered = 0;
                for member in room.members().iter().filter(|m| &m.connection_id != from) {
                    if self.send_to(&member.connection_id, ServerMessage::Transcript(line.clone())) {
                        delivered += 1;
                    }
                }
                delivered
            })
            .unwrap_or(0)
    }

    fn broadcast_room(&self, room: &Room) {
        let members = room.members().to_vec();
        debug!(
            "Broadcasting {} members of room {}",
            members.len(),
            room.id()
        );

        for member in room.members() {
            self.send_to(
                &member.connection_id,
                ServerMessage::Members {
                    members: members.clone(),
                },
            );
        }
    }

    fn send_to(&self, connection_id: &ConnectionId, msg: ServerMessage) -> bool {
        match self.inner.peers.get(connection_id) {
            Some(peer) => match peer.send(msg) {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to queue message for {}: {}", connection_id, e);
                    false
                }
            },
            None => {
                warn!("Attempted to send to disconnected peer {}", connection_id);
                false
            }
        }
    }
}
