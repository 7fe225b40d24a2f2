use crate::error::ClientError;
use crate::session::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshcall_core::{ClientMessage, ConnectionId, JoinRequest, ServerMessage, Signal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(ServerMessage),
    Closed,
}

enum Outbound {
    Message(ClientMessage),
    Close,
}

/// Cloneable send half of a [`MessageChannel`]. Nothing is sent after `close`.
#[derive(Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl ChannelSender {
    pub fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.tx
            .send(Outbound::Message(msg))
            .map_err(|_| ClientError::Closed)
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Outbound::Close);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingOutput for ChannelSender {
    async fn send_signal(&self, to: ConnectionId, signal: Signal) -> Result<(), ClientError> {
        self.send(ClientMessage::Signal { to, signal })
    }
}

/// Builds `<base>?roomId=..&userId=..&displayName=..`.
pub fn signaling_url(base: &str, request: &JoinRequest) -> Result<Url, ClientError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("roomId", request.room_id.as_str())
        .append_pair("userId", request.user_id.as_str())
        .append_pair("displayName", &request.display_name);
    Ok(url)
}

/// Background tasks pumping one websocket.
pub struct ChannelTasks {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl ChannelTasks {
    /// Waits for the writer to flush its close frame, then stops reading.
    pub async fn shutdown(self) {
        let mut writer = self.writer;
        if tokio::time::timeout(Duration::from_secs(2), &mut writer)
            .await
            .is_err()
        {
            writer.abort();
        }
        self.reader.abort();
    }
}

/// Client end of the signaling websocket.
pub struct MessageChannel {
    sender: ChannelSender,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    tasks: ChannelTasks,
}

impl MessageChannel {
    pub async fn connect(base_url: &str, request: &JoinRequest) -> Result<Self, ClientError> {
        let url = signaling_url(base_url, request)?;
        let (ws, _) = connect_async(url.as_str()).await?;
        info!("Signaling channel open to {}", base_url);

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(outbound) = out_rx.recv().await {
                match outbound {
                    Outbound::Message(msg) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize client message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::text(json)).await {
                            warn!("Signaling send failed: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
            debug!("Signaling writer stopped");
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(msg) => {
                                if events_tx.send(ChannelEvent::Message(msg)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid ServerMessage: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling receive failed: {}", e);
                        break;
                    }
                }
            }
            let _ = events_tx.send(ChannelEvent::Closed);
            info!("Signaling channel closed");
        });

        Ok(Self {
            sender: ChannelSender {
                tx: out_tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            events: events_rx,
            tasks: ChannelTasks { writer, reader },
        })
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn into_parts(
        self,
    ) -> (
        ChannelSender,
        mpsc::UnboundedReceiver<ChannelEvent>,
        ChannelTasks,
    ) {
        (self.sender, self.events, self.tasks)
    }
}
