use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use meshcall_client::ClientEvent;
use meshcall_client::channel::ChannelEvent;
use meshcall_client::orchestrator::OrchestratorCommand;
use meshcall_core::{ConnectionId, ServerMessage};

use super::{Fixture, members};
use crate::integration::init_tracing;
use crate::utils::Call;

fn membership(ids: &[&str]) -> ChannelEvent {
    ChannelEvent::Message(ServerMessage::Members {
        members: members(ids),
    })
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_peer_reported_once() {
    init_tracing();
    let Fixture {
        orchestrator,
        factory,
        mut sent,
        mut events,
        media,
        ..
    } = Fixture::new();
    let y = ConnectionId::from("y");

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(orchestrator.run(inbound_rx, commands_rx));

    inbound_tx.send(membership(&[])).unwrap();
    inbound_tx.send(membership(&["y"])).unwrap();
    let (to, _) = sent.recv().await.unwrap();
    assert_eq!(to, y);

    // Never answered: connect deadline, then every backoff step.
    let mut attempts = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            ClientEvent::PeerReconnecting {
                connection_id,
                attempt,
            } => {
                assert_eq!(connection_id, y);
                attempts.push(attempt);
            }
            ClientEvent::ConnectionLost(id) => {
                assert_eq!(id, y);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(attempts, vec![1, 2, 3]);

    // Still listed by the server, but not called again.
    inbound_tx.send(membership(&["y"])).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(factory.opened().len(), 1);

    let (done_tx, done_rx) = oneshot::channel();
    commands_tx
        .send(OrchestratorCommand::Leave { done: done_tx })
        .unwrap();
    assert_eq!(done_rx.await.unwrap().sessions_closed, 0);
    task.await.unwrap();
    assert!(media.is_released());

    while let Some(event) = events.recv().await {
        assert!(!matches!(event, ClientEvent::ConnectionLost(_)));
    }
}

#[tokio::test]
async fn test_channel_loss_closes_sessions() {
    init_tracing();
    let Fixture {
        orchestrator,
        factory,
        mut sent,
        mut events,
        ..
    } = Fixture::new();

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(orchestrator.run(inbound_rx, commands_rx));

    inbound_tx.send(membership(&[])).unwrap();
    inbound_tx.send(membership(&["a"])).unwrap();
    sent.recv().await.unwrap();

    inbound_tx.send(ChannelEvent::Closed).unwrap();
    loop {
        if events.recv().await.unwrap() == ClientEvent::ChannelClosed {
            break;
        }
    }
    let log = factory.connection_to(&ConnectionId::from("a")).unwrap().log;
    assert_eq!(log.count(|c| *c == Call::Close), 1);

    let (done_tx, done_rx) = oneshot::channel();
    commands_tx
        .send(OrchestratorCommand::Leave { done: done_tx })
        .unwrap();
    assert_eq!(done_rx.await.unwrap().sessions_closed, 0);
    task.await.unwrap();
}
