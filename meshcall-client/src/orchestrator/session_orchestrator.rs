use crate::channel::ChannelEvent;
use crate::config::SessionConfig;
use crate::media::{ConnectionFactory, LocalMedia};
use crate::orchestrator::{ClientEvent, diff_members, remote_members};
use crate::session::{
    PeerSession, SessionEvent, SessionEventKind, SessionHandle, SessionParams, SignalingOutput,
};
use futures::future::join_all;
use meshcall_core::{ConnectionId, IceServerConfig, Participant, ServerMessage, Signal};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum OrchestratorCommand {
    Leave { done: oneshot::Sender<LeaveReport> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveReport {
    pub sessions_closed: usize,
}

/// Keeps one peer session per remote participant of the local client's room.
///
/// The first membership broadcast after joining is a baseline: those members
/// already in the room call us, so only participants appearing afterwards get an
/// initiating session. Sessions for callers we have not seen yet are created
/// when their offer arrives.
pub struct SessionOrchestrator {
    local_id: ConnectionId,
    ice_servers: Vec<IceServerConfig>,
    config: SessionConfig,
    factory: Arc<dyn ConnectionFactory>,
    output: Arc<dyn SignalingOutput>,
    local_media: LocalMedia,
    sessions: HashMap<ConnectionId, SessionHandle>,
    known: Option<Vec<Participant>>,
    /// Departed or abandoned peers; their late signals are dropped.
    retired: HashSet<ConnectionId>,
    session_events_tx: mpsc::UnboundedSender<SessionEvent>,
    session_events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    client_events: mpsc::UnboundedSender<ClientEvent>,
}

impl SessionOrchestrator {
    pub fn new(
        local_id: ConnectionId,
        ice_servers: Vec<IceServerConfig>,
        config: SessionConfig,
        factory: Arc<dyn ConnectionFactory>,
        output: Arc<dyn SignalingOutput>,
        local_media: LocalMedia,
        client_events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (session_events_tx, session_events_rx) = mpsc::unbounded_channel();
        Self {
            local_id,
            ice_servers,
            config,
            factory,
            output,
            local_media,
            sessions: HashMap::new(),
            known: None,
            retired: HashSet::new(),
            session_events_tx,
            session_events_rx,
            client_events,
        }
    }

    pub fn local_id(&self) -> &ConnectionId {
        &self.local_id
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, remote: &ConnectionId) -> bool {
        self.sessions.contains_key(remote)
    }

    pub async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Members { members } => self.apply_membership(members).await,
            ServerMessage::Signal { from, signal } => self.route_signal(from, signal).await,
            ServerMessage::UserDisconnected { user_id } => {
                self.emit(ClientEvent::UserDisconnected(user_id))
            }
            ServerMessage::Transcript(line) => self.emit(ClientEvent::Transcript(line)),
            ServerMessage::Welcome { .. } => debug!("Ignoring repeated welcome"),
        }
    }

    pub async fn apply_membership(&mut self, members: Vec<Participant>) {
        let current = remote_members(&members, &self.local_id);

        let Some(previous) = self.known.replace(current.clone()) else {
            info!("Joined room with {} other participants", current.len());
            for participant in current {
                self.emit(ClientEvent::ParticipantJoined(participant));
            }
            return;
        };

        let diff = diff_members(&previous, &current);

        for participant in diff.left {
            let remote = participant.connection_id.clone();
            if let Some(handle) = self.sessions.remove(&remote) {
                handle.close().await;
            }
            self.retired.insert(remote);
            self.emit(ClientEvent::ParticipantLeft(participant));
        }

        for participant in diff.joined {
            let remote = participant.connection_id.clone();
            if !self.retired.contains(&remote) && !self.sessions.contains_key(&remote) {
                self.open_session(remote, true).await;
            }
            self.emit(ClientEvent::ParticipantJoined(participant));
        }
    }

    pub async fn route_signal(&mut self, from: ConnectionId, signal: Signal) {
        let kind = signal.kind();

        if self.retired.contains(&from) {
            debug!("Dropping {} from departed peer {}", kind, from);
            return;
        }

        if !self.sessions.contains_key(&from) {
            if !matches!(signal, Signal::Offer(_)) {
                debug!("No session for {}, dropping {}", from, kind);
                return;
            }
            debug!("Offer from unseen peer {}, opening session", from);
            if !self.open_session(from.clone(), false).await {
                return;
            }
        }

        if let Some(handle) = self.sessions.get(&from) {
            if !handle.signal(signal) {
                warn!("Session for {} stopped before {} arrived", from, kind);
            }
        }
    }

    pub fn handle_session_event(&mut self, event: SessionEvent) {
        let SessionEvent { remote, kind } = event;
        match kind {
            SessionEventKind::Connected => self.emit(ClientEvent::PeerConnected(remote)),
            SessionEventKind::Reconnecting { attempt } => {
                self.emit(ClientEvent::PeerReconnecting {
                    connection_id: remote,
                    attempt,
                })
            }
            SessionEventKind::Failed => {
                self.retired.insert(remote.clone());
                if self.sessions.remove(&remote).is_some() {
                    warn!("Connection to {} lost", remote);
                    self.emit(ClientEvent::ConnectionLost(remote));
                }
            }
        }
    }

    /// Closes every session, then releases local media.
    pub async fn leave(&mut self) -> LeaveReport {
        let sessions_closed = self.close_all_sessions().await;
        self.local_media.release();
        info!("Left room, closed {} sessions", sessions_closed);
        LeaveReport { sessions_closed }
    }

    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<ChannelEvent>,
        mut commands: mpsc::UnboundedReceiver<OrchestratorCommand>,
    ) {
        let mut channel_open = true;

        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    let report = self.leave().await;
                    if let Some(OrchestratorCommand::Leave { done }) = cmd {
                        let _ = done.send(report);
                    }
                    break;
                }

                Some(event) = self.session_events_rx.recv() => self.handle_session_event(event),

                event = inbound.recv(), if channel_open => match event {
                    Some(ChannelEvent::Message(msg)) => self.handle_server_message(msg).await,
                    Some(ChannelEvent::Closed) | None => {
                        channel_open = false;
                        warn!("Signaling channel lost, closing all sessions");
                        self.close_all_sessions().await;
                        self.emit(ClientEvent::ChannelClosed);
                    }
                },
            }
        }
    }

    async fn open_session(&mut self, remote: ConnectionId, initiator: bool) -> bool {
        let (media_tx, media_rx) = mpsc::unbounded_channel();

        let connection = match self
            .factory
            .open(&remote, &self.ice_servers, media_tx)
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to open connection to {}: {}", remote, e);
                self.retired.insert(remote.clone());
                self.emit(ClientEvent::ConnectionLost(remote));
                return false;
            }
        };

        let params = SessionParams {
            local_id: self.local_id.clone(),
            remote_id: remote.clone(),
            initiator,
            config: self.config,
            local_media: self.local_media.clone(),
            output: self.output.clone(),
            events: self.session_events_tx.clone(),
            factory: self.factory.clone(),
            ice_servers: self.ice_servers.clone(),
        };

        let handle = PeerSession::spawn(params, connection, media_rx);
        self.sessions.insert(remote, handle);
        true
    }

    async fn close_all_sessions(&mut self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.drain().map(|(_, h)| h).collect();
        self.retired.extend(handles.iter().map(|h| h.remote().clone()));

        join_all(handles.into_iter().map(SessionHandle::close))
            .await
            .into_iter()
            .filter(|closed| *closed)
            .count()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.client_events.send(event);
    }
}
