use std::time::Duration;
use tokio::time::Instant;

use meshcall_client::SessionConfig;
use meshcall_client::media::{ConnectionHealth, MediaEvent};
use meshcall_client::session::SessionEventKind;
use meshcall_core::Signal;

use crate::integration::init_tracing;
use crate::utils::{Call, SessionHarness};

#[tokio::test(start_paused = true)]
async fn test_unconnected_session_starts_reconnecting() {
    init_tracing();
    let started = Instant::now();
    let mut session = SessionHarness::spawn("a", "b", true);

    let (_, signal) = session.sent.recv().await.unwrap();
    assert!(matches!(signal, Signal::Offer(_)));

    // 15s connect deadline, then the first 1s backoff step.
    let event = session.events.recv().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::Reconnecting { attempt: 1 });
    assert_eq!(started.elapsed().as_secs(), 16);

    // The restart offer replaces the unanswered first offer on the same connection.
    let (_, signal) = session.sent.recv().await.unwrap();
    assert!(matches!(signal, Signal::Offer(_)));
    assert_eq!(
        session.log.calls(),
        vec![
            Call::AttachMedia,
            Call::CreateOffer { ice_restart: false },
            Call::CreateOffer { ice_restart: true },
        ]
    );
    assert_eq!(session.connections().len(), 1);

    assert!(session.handle.close().await);
}

#[tokio::test(start_paused = true)]
async fn test_connected_session_has_no_deadline() {
    init_tracing();
    let config = SessionConfig {
        connect_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    };
    let mut session = SessionHarness::spawn_with("b", "a", false, config);

    session.media_event(MediaEvent::Health(ConnectionHealth::Healthy));
    assert_eq!(
        session.events.recv().await.unwrap().kind,
        SessionEventKind::Connected
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(session.events.try_recv().is_err());
    assert!(session.log.calls().is_empty());

    assert!(session.handle.close().await);
}
