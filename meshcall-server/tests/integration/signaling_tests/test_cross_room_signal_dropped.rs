use meshcall_core::{ClientMessage, ConnectionId, SessionDescription, Signal};

use crate::integration::init_tracing;
use crate::utils::{TestClient, TestServer};

#[tokio::test]
async fn test_cross_room_signal_dropped() {
    init_tracing();
    let server = TestServer::start().await.expect("Failed to start server");

    let mut ann = TestClient::join(&server, "r1", "ann").await.unwrap();
    ann.recv_members().await.unwrap();
    let mut eve = TestClient::join(&server, "r2", "eve").await.unwrap();
    eve.recv_members().await.unwrap();

    ann.send(ClientMessage::Signal {
        to: eve.connection_id.clone(),
        signal: Signal::Offer(SessionDescription::new("v=0")),
    })
    .await
    .unwrap();

    eve.expect_silence().await.expect("signal must not cross rooms");
    ann.expect_silence().await.expect("sender receives no error");

    server.stop().await;
}

#[tokio::test]
async fn test_signal_to_departed_peer_is_silent() {
    init_tracing();
    let server = TestServer::start().await.expect("Failed to start server");

    let mut ann = TestClient::join(&server, "r1", "ann").await.unwrap();
    ann.recv_members().await.unwrap();

    ann.send(ClientMessage::Signal {
        to: ConnectionId::from("long-gone"),
        signal: Signal::Answer(SessionDescription::new("v=0")),
    })
    .await
    .unwrap();

    ann.expect_silence().await.expect("sender receives no error");

    server.stop().await;
}
