use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::media::{
    ConnectionFactory, ConnectionHealth, DescriptionKind, LocalMedia, MediaConnection, MediaEvent,
};
use crate::session::{
    Backoff, CandidateBuffer, SessionCommand, SessionEvent, SessionEventKind, SessionHandle,
    SignalingOutput, SignalingState, ignores_colliding_offer, is_collision,
};
use meshcall_core::{ConnectionId, IceCandidate, IceServerConfig, SessionDescription, Signal};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Everything a session needs besides its media connection.
pub struct SessionParams {
    pub local_id: ConnectionId,
    pub remote_id: ConnectionId,
    /// Sends the first offer instead of waiting for one.
    pub initiator: bool,
    pub config: SessionConfig,
    pub local_media: LocalMedia,
    pub output: Arc<dyn SignalingOutput>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    /// Opens a replacement connection when a pending offer has to be dropped.
    pub factory: Arc<dyn ConnectionFactory>,
    pub ice_servers: Vec<IceServerConfig>,
}

/// Negotiation state machine for one remote participant.
///
/// Runs as its own task. Commands, media events and timers are consumed one at a
/// time, so negotiation state is never mutated concurrently.
pub struct PeerSession {
    local_id: ConnectionId,
    remote_id: ConnectionId,
    config: SessionConfig,
    connection: Box<dyn MediaConnection>,
    factory: Arc<dyn ConnectionFactory>,
    ice_servers: Vec<IceServerConfig>,
    local_media: LocalMedia,
    output: Arc<dyn SignalingOutput>,
    events: mpsc::UnboundedSender<SessionEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,

    state: SignalingState,
    making_offer: bool,
    has_remote_description: bool,
    media_attached: bool,
    restart_pending: bool,
    healthy: bool,
    candidates: CandidateBuffer,
    backoff: Backoff,
    retry_at: Option<Instant>,
    connect_deadline: Option<Instant>,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

impl PeerSession {
    /// Starts the session task. `media_events` must be the receiver paired with
    /// the sender the connection was opened with.
    pub fn spawn(
        params: SessionParams,
        connection: Box<dyn MediaConnection>,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
    ) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let remote = params.remote_id.clone();
        let initiator = params.initiator;

        let session = PeerSession {
            local_id: params.local_id,
            remote_id: params.remote_id,
            config: params.config,
            connection,
            factory: params.factory,
            ice_servers: params.ice_servers,
            local_media: params.local_media,
            output: params.output,
            events: params.events,
            commands: commands_rx,
            media_events,
            state: SignalingState::Stable,
            making_offer: false,
            has_remote_description: false,
            media_attached: false,
            restart_pending: false,
            healthy: false,
            candidates: CandidateBuffer::new(),
            backoff: Backoff::new(params.config.backoff),
            retry_at: None,
            connect_deadline: None,
        };

        let task = tokio::spawn(session.run(initiator));
        SessionHandle::new(remote, commands_tx, task)
    }

    async fn run(mut self, initiator: bool) {
        info!(
            "Session {} -> {} started (initiator: {})",
            self.local_id, self.remote_id, initiator
        );

        self.connect_deadline = Some(Instant::now() + self.config.connect_timeout);
        if initiator {
            self.negotiate(false).await;
        }

        loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Signal(signal)) => self.handle_signal(signal).await,
                    Some(SessionCommand::Close { done }) => {
                        self.close().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.close().await;
                        break;
                    }
                },

                Some(event) = self.media_events.recv() => self.handle_media_event(event).await,

                _ = sleep_until_opt(self.retry_at) => {
                    if self.retry().await.is_break() {
                        break;
                    }
                }

                _ = sleep_until_opt(self.connect_deadline) => {
                    self.connect_deadline = None;
                    warn!("Session with {} not connected in time", self.remote_id);
                    self.on_health(ConnectionHealth::Failed);
                }
            }
        }

        debug!("Session {} -> {} stopped", self.local_id, self.remote_id);
    }

    async fn handle_signal(&mut self, signal: Signal) {
        let kind = signal.kind();
        let result = match signal {
            Signal::Offer(desc) => self.on_remote_offer(desc).await,
            Signal::Answer(desc) => self.on_remote_answer(desc).await,
            Signal::IceCandidate(candidate) => self.on_remote_candidate(candidate).await,
        };

        if let Err(e) = result {
            warn!("Failed to apply {} from {}: {}", kind, self.remote_id, e);
        }

        if self.restart_pending && self.can_restart() {
            self.restart_pending = false;
            self.negotiate(true).await;
        }
    }

    async fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::NegotiationNeeded => {
                if self.can_offer() {
                    self.negotiate(false).await;
                } else {
                    debug!(
                        "Negotiation with {} already in progress, skipping",
                        self.remote_id
                    );
                }
            }
            MediaEvent::LocalCandidate(candidate) => {
                self.send(Signal::IceCandidate(candidate)).await;
            }
            MediaEvent::Health(health) => self.on_health(health),
        }
    }

    fn can_offer(&self) -> bool {
        self.state == SignalingState::Stable && !self.making_offer
    }

    /// A restart offer may replace our own unanswered offer.
    fn can_restart(&self) -> bool {
        !self.making_offer
            && matches!(
                self.state,
                SignalingState::Stable | SignalingState::HaveLocalOffer
            )
    }

    /// Sends an offer if no exchange is in flight. An ICE restart also goes out
    /// over an unanswered offer of ours; one blocked by a remote offer is
    /// remembered and retried once the session is stable again.
    async fn negotiate(&mut self, ice_restart: bool) {
        let allowed = if ice_restart {
            self.can_restart()
        } else {
            self.can_offer()
        };
        if !allowed {
            if ice_restart && self.state != SignalingState::Closed {
                self.restart_pending = true;
            }
            return;
        }

        if let Err(e) = self.attach_local_media().await {
            warn!("Failed to attach local media for {}: {}", self.remote_id, e);
        }

        self.making_offer = true;
        let result = self.connection.create_offer(ice_restart).await;
        self.making_offer = false;

        match result {
            Ok(offer) => {
                self.state = SignalingState::HaveLocalOffer;
                debug!(
                    "Sending offer to {} (ice restart: {})",
                    self.remote_id, ice_restart
                );
                self.send(Signal::Offer(offer)).await;
            }
            Err(e) => warn!("Failed to create offer for {}: {}", self.remote_id, e),
        }
    }

    async fn on_remote_offer(&mut self, offer: SessionDescription) -> Result<(), ClientError> {
        if is_collision(self.making_offer, self.state) {
            if ignores_colliding_offer(&self.local_id, &self.remote_id) {
                debug!("Ignoring colliding offer from {}", self.remote_id);
                return Ok(());
            }
            debug!("Yielding to colliding offer from {}", self.remote_id);
        }

        if self.state == SignalingState::HaveLocalOffer {
            self.reopen().await?;
        }

        self.connection
            .set_remote_description(DescriptionKind::Offer, offer)
            .await?;
        self.state = SignalingState::HaveRemoteOffer;
        self.on_remote_description_applied().await;

        match self.answer().await {
            Ok(answer) => {
                self.state = SignalingState::Stable;
                self.send(Signal::Answer(answer)).await;
                Ok(())
            }
            Err(e) => {
                if let Err(reopen_err) = self.reopen().await {
                    warn!(
                        "Failed to reopen connection to {} after a failed answer: {}",
                        self.remote_id, reopen_err
                    );
                    self.state = SignalingState::Stable;
                }
                Err(e)
            }
        }
    }

    /// Swaps in a fresh connection, discarding our pending offer or a remote
    /// offer we could not answer. Buffered candidates wait for the next remote
    /// description.
    async fn reopen(&mut self) -> Result<(), ClientError> {
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let connection = self
            .factory
            .open(&self.remote_id, &self.ice_servers, media_tx)
            .await?;

        let previous = std::mem::replace(&mut self.connection, connection);
        self.media_events = media_rx;
        if let Err(e) = previous.close().await {
            warn!(
                "Failed to close replaced connection to {}: {}",
                self.remote_id, e
            );
        }

        self.state = SignalingState::Stable;
        self.has_remote_description = false;
        self.media_attached = false;
        self.restart_pending = false;
        self.healthy = false;
        if self.connect_deadline.is_none() && self.retry_at.is_none() {
            self.connect_deadline = Some(Instant::now() + self.config.connect_timeout);
        }

        debug!("Reopened connection to {}", self.remote_id);
        Ok(())
    }

    async fn answer(&mut self) -> Result<SessionDescription, ClientError> {
        self.attach_local_media().await?;
        self.connection.create_answer().await
    }

    async fn on_remote_answer(&mut self, answer: SessionDescription) -> Result<(), ClientError> {
        if self.state != SignalingState::HaveLocalOffer {
            warn!(
                "Discarding answer from {} in state {:?}",
                self.remote_id, self.state
            );
            return Ok(());
        }

        self.connection
            .set_remote_description(DescriptionKind::Answer, answer)
            .await?;
        self.state = SignalingState::Stable;
        self.on_remote_description_applied().await;
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), ClientError> {
        if self.has_remote_description {
            self.connection.add_ice_candidate(candidate).await
        } else {
            self.candidates.push(candidate);
            debug!(
                "Buffered candidate from {} ({} pending)",
                self.remote_id,
                self.candidates.len()
            );
            Ok(())
        }
    }

    async fn on_remote_description_applied(&mut self) {
        self.has_remote_description = true;

        for candidate in self.candidates.drain() {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                warn!(
                    "Failed to apply buffered candidate from {}: {}",
                    self.remote_id, e
                );
            }
        }
    }

    async fn attach_local_media(&mut self) -> Result<(), ClientError> {
        if !self.media_attached {
            self.connection
                .attach_local_media(&self.local_media)
                .await?;
            self.media_attached = true;
        }
        Ok(())
    }

    fn on_health(&mut self, health: ConnectionHealth) {
        match health {
            ConnectionHealth::Healthy => {
                self.connect_deadline = None;
                self.retry_at = None;
                self.backoff.reset();
                if !self.healthy {
                    self.healthy = true;
                    info!("Connected to {}", self.remote_id);
                    self.emit(SessionEventKind::Connected);
                }
            }
            ConnectionHealth::Degraded | ConnectionHealth::Failed => {
                self.healthy = false;
                self.connect_deadline = None;
                if self.retry_at.is_none() {
                    let delay = self.backoff.current_delay();
                    info!(
                        "Connection to {} is {:?}, reconnecting in {:?}",
                        self.remote_id, health, delay
                    );
                    self.retry_at = Some(Instant::now() + delay);
                }
            }
        }
    }

    async fn retry(&mut self) -> ControlFlow<()> {
        self.retry_at = None;

        if self.backoff.is_exhausted() {
            warn!(
                "Giving up on {} after {} attempts",
                self.remote_id,
                self.backoff.attempt()
            );
            self.close().await;
            self.emit(SessionEventKind::Failed);
            return ControlFlow::Break(());
        }

        let attempt = self.backoff.advance();
        info!("Reconnecting to {} (attempt {})", self.remote_id, attempt);
        self.emit(SessionEventKind::Reconnecting { attempt });

        // Once an exchange completed only the side that wins collisions
        // restarts, so both ends never offer at once.
        if self.has_remote_description
            && !ignores_colliding_offer(&self.local_id, &self.remote_id)
        {
            debug!("Waiting for {} to restart ICE", self.remote_id);
        } else {
            self.negotiate(true).await;
        }

        self.retry_at = Some(Instant::now() + self.backoff.current_delay());
        ControlFlow::Continue(())
    }

    async fn close(&mut self) {
        if self.state == SignalingState::Closed {
            return;
        }
        self.state = SignalingState::Closed;
        self.retry_at = None;
        self.connect_deadline = None;
        self.candidates.clear();

        if let Err(e) = self.connection.close().await {
            warn!("Failed to close connection to {}: {}", self.remote_id, e);
        }
        info!("Session with {} closed", self.remote_id);
    }

    async fn send(&self, signal: Signal) {
        let kind = signal.kind();
        if let Err(e) = self.output.send_signal(self.remote_id.clone(), signal).await {
            warn!("Failed to send {} to {}: {}", kind, self.remote_id, e);
        }
    }

    fn emit(&self, kind: SessionEventKind) {
        let _ = self.events.send(SessionEvent {
            remote: self.remote_id.clone(),
            kind,
        });
    }
}
