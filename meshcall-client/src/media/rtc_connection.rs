use crate::error::ClientError;
use crate::media::{
    ConnectionFactory, ConnectionHealth, DescriptionKind, LocalMedia, LocalTrack, MediaConnection,
    MediaEvent,
};
use async_trait::async_trait;
use meshcall_core::{ConnectionId, IceCandidate, IceServerConfig, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

/// Maps ICE connectivity onto session health. States without a band are ignored.
pub fn health_from_ice_state(state: RTCIceConnectionState) -> Option<ConnectionHealth> {
    match state {
        RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
            Some(ConnectionHealth::Healthy)
        }
        RTCIceConnectionState::Disconnected => Some(ConnectionHealth::Degraded),
        RTCIceConnectionState::Failed => Some(ConnectionHealth::Failed),
        _ => None,
    }
}

fn to_rtc_ice_server(config: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: config.urls.clone(),
        username: config.username.clone().unwrap_or_default(),
        credential: config.credential.clone().unwrap_or_default(),
    }
}

/// webrtc-rs peer connection to one remote participant.
pub struct RtcConnection {
    remote: ConnectionId,
    peer_connection: Arc<RTCPeerConnection>,
    /// Set while tracks attached for an answer are pending. The answer already
    /// carries them, so webrtc's negotiation-needed for them is not forwarded.
    answered_tracks: Arc<AtomicBool>,
}

impl RtcConnection {
    /// Builds the peer connection and wires its callbacks into `events`.
    pub async fn new(
        remote: ConnectionId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Self, ClientError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        let remote_state = remote.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |state: RTCIceConnectionState| {
                let tx = state_tx.clone();
                let remote = remote_state.clone();

                Box::pin(async move {
                    info!("ICE connection state for {} changed: {}", remote, state);
                    if let Some(health) = health_from_ice_state(state) {
                        let _ = tx.send(MediaEvent::Health(health));
                    }
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(MediaEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        let answered_tracks = Arc::new(AtomicBool::new(false));
        let negotiation_tx = events;
        let negotiation_answered = Arc::clone(&answered_tracks);
        let remote_negotiation = remote.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let tx = negotiation_tx.clone();
            let answered = negotiation_answered.load(Ordering::SeqCst);
            let remote = remote_negotiation.clone();
            Box::pin(async move {
                if answered {
                    debug!("Negotiation for {} covered by our answer", remote);
                    return;
                }
                let _ = tx.send(MediaEvent::NegotiationNeeded);
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            answered_tracks,
        })
    }
}

#[async_trait]
impl MediaConnection for RtcConnection {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<(), ClientError> {
        let answering = self.peer_connection.remote_description().await.is_some();
        if answering {
            // add_track reuses the transceivers the remote offer created
            self.answered_tracks.store(true, Ordering::SeqCst);
        } else if media.tracks().is_empty() {
            // an offer without media sections never starts ICE
            for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
                self.peer_connection
                    .add_transceiver_from_kind(
                        kind,
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Recvonly,
                            send_encodings: vec![],
                        }),
                    )
                    .await?;
            }
        }

        for track in media.tracks() {
            let sender = self.peer_connection.add_track(Arc::clone(track)).await?;

            // RTCP has to be read for interceptors to work
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }
        debug!(
            "Attached {} local tracks for {}",
            media.tracks().len(),
            self.remote
        );
        Ok(())
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, ClientError> {
        self.answered_tracks.store(false, Ordering::SeqCst);

        // before any remote description there are no ICE credentials to replace,
        // a plain re-offer carries the gathered candidates
        let ice_restart =
            ice_restart && self.peer_connection.remote_description().await.is_some();
        let options = RTCOfferOptions {
            ice_restart,
            ..Default::default()
        };
        let offer = self.peer_connection.create_offer(Some(options)).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::new(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ClientError> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::new(answer.sdp))
    }

    async fn set_remote_description(
        &self,
        kind: DescriptionKind,
        description: SessionDescription,
    ) -> Result<(), ClientError> {
        let desc = match kind {
            DescriptionKind::Offer => RTCSessionDescription::offer(description.sdp)?,
            DescriptionKind::Answer => RTCSessionDescription::answer(description.sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ClientError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Opens [`RtcConnection`]s that all share the same local tracks.
#[derive(Clone, Default)]
pub struct RtcConnectionFactory {
    tracks: Vec<LocalTrack>,
    receive_only: bool,
}

impl RtcConnectionFactory {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            tracks,
            receive_only: false,
        }
    }

    /// Joins without sending any local media.
    pub fn receive_only() -> Self {
        Self {
            tracks: Vec::new(),
            receive_only: true,
        }
    }
}

#[async_trait]
impl ConnectionFactory for RtcConnectionFactory {
    async fn prepare(&self) -> Result<LocalMedia, ClientError> {
        if self.tracks.is_empty() && !self.receive_only {
            return Err(ClientError::MediaUnavailable(
                "no local audio or video track".to_owned(),
            ));
        }
        Ok(LocalMedia::new(self.tracks.clone()))
    }

    async fn open(
        &self,
        remote: &ConnectionId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaConnection>, ClientError> {
        let connection = RtcConnection::new(remote.clone(), ice_servers, events).await?;
        Ok(Box::new(connection))
    }
}
