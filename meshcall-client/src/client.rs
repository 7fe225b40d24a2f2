use crate::channel::{ChannelEvent, ChannelSender, ChannelTasks, MessageChannel};
use crate::config::ClientConfig;
use crate::directory::UserDirectory;
use crate::error::ClientError;
use crate::media::ConnectionFactory;
use crate::orchestrator::{ClientEvent, LeaveReport, OrchestratorCommand, SessionOrchestrator};
use meshcall_core::{
    ClientMessage, ConnectionId, JoinRequest, RoomId, ServerMessage, TranscriptLine, UserId,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A joined room. Dropping it without [`MeshClient::leave`] still tears the sessions down.
pub struct MeshClient {
    connection_id: ConnectionId,
    room_id: RoomId,
    user_id: UserId,
    display_name: String,
    sender: ChannelSender,
    commands: mpsc::UnboundedSender<OrchestratorCommand>,
    orchestrator: JoinHandle<()>,
    channel_tasks: ChannelTasks,
}

impl MeshClient {
    /// Looks up the local user, acquires local media, opens the signaling channel
    /// and starts negotiating with the room.
    pub async fn join(
        config: ClientConfig,
        directory: &dyn UserDirectory,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        let profile = directory.lookup(&config.user_id).await?;
        let room_id = config.room_id.clone().unwrap_or(profile.room_id);

        let local_media = factory.prepare().await?;

        let request = JoinRequest {
            room_id: room_id.clone(),
            user_id: profile.user_id.clone(),
            display_name: profile.display_name.clone(),
        };

        let mut channel = match MessageChannel::connect(&config.signaling_url, &request).await {
            Ok(channel) => channel,
            Err(e) => {
                local_media.release();
                return Err(e);
            }
        };

        let welcome = tokio::time::timeout(config.welcome_timeout, channel.recv()).await;
        let (connection_id, announced_ice) = match welcome {
            Ok(Some(ChannelEvent::Message(ServerMessage::Welcome {
                connection_id,
                ice_servers,
            }))) => (connection_id, ice_servers),
            other => {
                local_media.release();
                let (sender, _, tasks) = channel.into_parts();
                sender.close();
                tasks.shutdown().await;
                return Err(ClientError::Handshake(match other {
                    Err(_) => "no welcome from server".to_owned(),
                    Ok(event) => format!("unexpected first event {event:?}"),
                }));
            }
        };

        info!(
            "Joined room {} as {} ({})",
            room_id, profile.display_name, connection_id
        );

        let ice_servers = config.ice_servers.clone().unwrap_or(announced_ice);
        let (sender, inbound, channel_tasks) = channel.into_parts();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let orchestrator = SessionOrchestrator::new(
            connection_id.clone(),
            ice_servers,
            config.session,
            factory,
            Arc::new(sender.clone()),
            local_media,
            events_tx,
        );
        let orchestrator = tokio::spawn(orchestrator.run(inbound, commands_rx));

        Ok((
            Self {
                connection_id,
                room_id,
                user_id: profile.user_id,
                display_name: profile.display_name,
                sender,
                commands: commands_tx,
                orchestrator,
                channel_tasks,
            },
            events_rx,
        ))
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Shares a transcript line with everyone else in the room.
    pub fn send_transcript(&self, content: impl Into<String>) -> Result<(), ClientError> {
        self.sender.send(ClientMessage::Transcript(TranscriptLine {
            content: content.into(),
            user_id: self.user_id.clone(),
            user_name: self.display_name.clone(),
        }))
    }

    /// Closes every peer session, releases local media, then closes the channel.
    pub async fn leave(self) -> Result<LeaveReport, ClientError> {
        let (done_tx, done_rx) = oneshot::channel();
        let report = if self
            .commands
            .send(OrchestratorCommand::Leave { done: done_tx })
            .is_ok()
        {
            done_rx.await.map_err(|_| ClientError::Closed)
        } else {
            Err(ClientError::Closed)
        };

        self.sender.close();
        self.channel_tasks.shutdown().await;
        if let Err(e) = self.orchestrator.await {
            warn!("Orchestrator task ended abnormally: {}", e);
        }

        info!("Left room {}", self.room_id);
        report
    }
}
