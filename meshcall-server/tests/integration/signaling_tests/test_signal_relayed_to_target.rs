use meshcall_core::{ClientMessage, IceCandidate, ServerMessage, SessionDescription, Signal};

use crate::integration::init_tracing;
use crate::utils::{TestClient, TestServer};

#[tokio::test]
async fn test_signal_relayed_to_target() {
    init_tracing();
    let server = TestServer::start().await.expect("Failed to start server");

    let mut ann = TestClient::join(&server, "r1", "ann").await.unwrap();
    ann.recv_members().await.unwrap();
    let mut bob = TestClient::join(&server, "r1", "bob").await.unwrap();
    bob.recv_members().await.unwrap();
    ann.recv_members().await.unwrap();
    let mut cat = TestClient::join(&server, "r1", "cat").await.unwrap();
    cat.recv_members().await.unwrap();
    ann.recv_members().await.unwrap();
    bob.recv_members().await.unwrap();

    let offer = Signal::Offer(SessionDescription::new("v=0 offer"));
    let candidate = Signal::IceCandidate(IceCandidate::new("candidate:1"));
    for signal in [offer.clone(), candidate.clone()] {
        ann.send(ClientMessage::Signal {
            to: bob.connection_id.clone(),
            signal,
        })
        .await
        .unwrap();
    }

    // Order per pair is preserved and the sender is stamped by the server.
    for expected in [offer, candidate] {
        match bob.recv().await.unwrap() {
            ServerMessage::Signal { from, signal } => {
                assert_eq!(from, ann.connection_id);
                assert_eq!(signal, expected);
            }
            other => panic!("Expected signal, got {:?}", other),
        }
    }

    cat.expect_silence().await.expect("bystander must not see the signal");
    ann.expect_silence().await.expect("sender gets no echo");

    server.stop().await;
}
