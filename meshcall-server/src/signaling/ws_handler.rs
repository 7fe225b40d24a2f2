use crate::signaling::{RelayOutcome, SignalingRouter};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use meshcall_core::{ClientMessage, JoinRequest, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// `GET /ws?roomId=..&userId=..&displayName=..`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(request): Query<JoinRequest>,
    State(router): State<SignalingRouter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, request, router))
}

async fn handle_socket(socket: WebSocket, request: JoinRequest, router: SignalingRouter) {
    let room_id = request.room_id.clone();

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let participant = router.connect(request, tx);
    let connection_id = participant.connection_id;

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let router = router.clone();
        let room_id = room_id.clone();
        let connection_id = connection_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(ClientMessage::Signal { to, signal }) => {
                                if let RelayOutcome::Dropped(reason) =
                                    router.relay(&room_id, &connection_id, &to, signal)
                                {
                                    debug!("Signal from {} not delivered: {}", connection_id, reason);
                                }
                            }
                            Ok(ClientMessage::Transcript(line)) => {
                                router.relay_transcript(&room_id, &connection_id, line);
                            }
                            Err(e) => {
                                warn!("Invalid ClientMessage from {}: {}", connection_id, e)
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    router.disconnect(&room_id, &connection_id);
    info!("WebSocket disconnected: {}", connection_id);
}
