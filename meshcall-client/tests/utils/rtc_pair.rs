use anyhow::{Result, bail};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use meshcall_client::SessionConfig;
use meshcall_client::media::{ConnectionFactory, LocalTrack, RtcConnectionFactory};
use meshcall_client::session::{
    PeerSession, SessionEvent, SessionEventKind, SessionHandle, SessionParams,
};
use meshcall_core::{ConnectionId, Signal};

use super::{RecordingOutput, Sent};

/// Time allowed for ICE to connect over loopback (ms).
pub const RTC_TIMEOUT_MS: u64 = 10_000;

/// How long signals keep flowing once both sides are connected (ms).
pub const RTC_SETTLE_MS: u64 = 1_000;

pub fn video_track(id: &str) -> LocalTrack {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        format!("video-{id}"),
        format!("meshcall-{id}"),
    ))
}

/// A session driving a real webrtc connection, with its outbound signals
/// counted as they are relayed.
pub struct RtcPeer {
    pub id: ConnectionId,
    pub handle: SessionHandle,
    pub sent: mpsc::UnboundedReceiver<Sent>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub offers: usize,
    pub answers: usize,
    pub connected: bool,
}

impl RtcPeer {
    pub async fn spawn(
        local: &str,
        remote: &str,
        initiator: bool,
        factory: RtcConnectionFactory,
        config: SessionConfig,
    ) -> Result<Self> {
        let factory = Arc::new(factory);
        let local_media = factory.prepare().await?;
        let remote_id = ConnectionId::from(remote);

        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let connection = factory.open(&remote_id, &[], media_tx).await?;

        let (output, sent) = RecordingOutput::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let params = SessionParams {
            local_id: ConnectionId::from(local),
            remote_id,
            initiator,
            config,
            local_media,
            output,
            events: events_tx,
            factory,
            ice_servers: Vec::new(),
        };

        Ok(Self {
            id: ConnectionId::from(local),
            handle: PeerSession::spawn(params, connection, media_rx),
            sent,
            events,
            offers: 0,
            answers: 0,
            connected: false,
        })
    }

    fn record(&mut self, signal: &Signal) {
        match signal {
            Signal::Offer(_) => self.offers += 1,
            Signal::Answer(_) => self.answers += 1,
            Signal::IceCandidate(_) => {}
        }
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event.kind {
            SessionEventKind::Connected => self.connected = true,
            SessionEventKind::Reconnecting { attempt } => {
                tracing::debug!("[RtcPeer] {} reconnecting ({})", self.id, attempt);
                self.connected = false;
            }
            SessionEventKind::Failed => self.connected = false,
        }
    }

    /// Swallows everything this peer sends up to and including its next offer.
    pub async fn next_offer(&mut self) -> Result<Signal> {
        let deadline = Instant::now() + Duration::from_millis(RTC_TIMEOUT_MS);
        loop {
            tokio::select! {
                Some((_, signal)) = self.sent.recv() => {
                    self.record(&signal);
                    if matches!(signal, Signal::Offer(_)) {
                        return Ok(signal);
                    }
                }
                Some(event) = self.events.recv() => self.on_event(event),
                _ = tokio::time::sleep_until(deadline) => bail!("No offer from {}", self.id),
            }
        }
    }

    pub async fn close(self) {
        self.handle.close().await;
    }
}

/// Relays signals between `a` and `b` until both report connected, then for a
/// short settle window so late renegotiation shows up in the counters.
pub async fn relay_until_connected(a: &mut RtcPeer, b: &mut RtcPeer) -> Result<()> {
    let deadline = Instant::now() + Duration::from_millis(RTC_TIMEOUT_MS);
    let mut settle_until: Option<Instant> = None;

    loop {
        if settle_until.is_none() && a.connected && b.connected {
            settle_until = Some(Instant::now() + Duration::from_millis(RTC_SETTLE_MS));
        }
        let wake_at = settle_until.unwrap_or(deadline);

        tokio::select! {
            Some((_, signal)) = a.sent.recv() => {
                a.record(&signal);
                b.handle.signal(signal);
            }
            Some((_, signal)) = b.sent.recv() => {
                b.record(&signal);
                a.handle.signal(signal);
            }
            Some(event) = a.events.recv() => a.on_event(event),
            Some(event) = b.events.recv() => b.on_event(event),
            _ = tokio::time::sleep_until(wake_at) => {
                if settle_until.is_some() && a.connected && b.connected {
                    return Ok(());
                }
                bail!(
                    "Not connected in time: a={} b={} offers_a={} offers_b={}",
                    a.connected,
                    b.connected,
                    a.offers,
                    b.offers
                );
            }
        }
    }
}
