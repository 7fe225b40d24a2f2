use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use meshcall_client::ClientError;
use meshcall_client::media::{
    ConnectionFactory, DescriptionKind, LocalMedia, MediaConnection, MediaEvent,
};
use meshcall_core::{ConnectionId, IceCandidate, IceServerConfig, SessionDescription};

/// One call made on a [`FakeConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AttachMedia,
    CreateOffer { ice_restart: bool },
    CreateAnswer,
    SetRemote(DescriptionKind, String),
    AddCandidate(String),
    Close,
}

/// Shared, ordered record of calls.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.calls().contains(call)
    }

    /// Remote candidates applied, in order.
    pub fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddCandidate(candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }
}

/// Media connection that records calls and fabricates SDP.
pub struct FakeConnection {
    label: String,
    log: CallLog,
    offers: AtomicUsize,
    fail_answer: bool,
}

impl FakeConnection {
    pub fn new(label: impl Into<String>, log: CallLog) -> Self {
        Self {
            label: label.into(),
            log,
            offers: AtomicUsize::new(0),
            fail_answer: false,
        }
    }
}

#[async_trait]
impl MediaConnection for FakeConnection {
    async fn attach_local_media(&self, _media: &LocalMedia) -> Result<(), ClientError> {
        self.log.push(Call::AttachMedia);
        Ok(())
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription, ClientError> {
        self.log.push(Call::CreateOffer { ice_restart });
        let n = self.offers.fetch_add(1, Ordering::SeqCst);
        Ok(SessionDescription::new(format!("offer-{}-{}", self.label, n)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ClientError> {
        self.log.push(Call::CreateAnswer);
        if self.fail_answer {
            return Err(ClientError::MediaUnavailable("encoder gone".to_owned()));
        }
        Ok(SessionDescription::new(format!("answer-{}", self.label)))
    }

    async fn set_remote_description(
        &self,
        kind: DescriptionKind,
        description: SessionDescription,
    ) -> Result<(), ClientError> {
        self.log.push(Call::SetRemote(kind, description.sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ClientError> {
        self.log.push(Call::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.log.push(Call::Close);
        Ok(())
    }
}

/// A connection handed out by [`FakeFactory`].
#[derive(Clone)]
pub struct OpenedConnection {
    pub remote: ConnectionId,
    pub log: CallLog,
    pub events: mpsc::UnboundedSender<MediaEvent>,
}

/// Factory producing [`FakeConnection`]s and remembering each one.
pub struct FakeFactory {
    label: String,
    /// Connections are named after the factory alone, not the remote.
    bare_label: bool,
    deny_media: bool,
    fail_first_answer: bool,
    opened: Mutex<Vec<OpenedConnection>>,
}

impl FakeFactory {
    fn build(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bare_label: false,
            deny_media: false,
            fail_first_answer: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(label))
    }

    /// Fails local media acquisition.
    pub fn denying_media(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            deny_media: true,
            ..Self::build(label)
        })
    }

    /// Factory for a single session; SDP is labelled `offer-{label}-{n}` / `answer-{label}`.
    pub fn for_session(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            bare_label: true,
            ..Self::build(label)
        })
    }

    /// Like [`FakeFactory::for_session`], but the first connection cannot answer.
    pub fn failing_first_answer(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            bare_label: true,
            fail_first_answer: true,
            ..Self::build(label)
        })
    }

    pub fn opened(&self) -> Vec<OpenedConnection> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn connection_to(&self, remote: &ConnectionId) -> Option<OpenedConnection> {
        self.opened().into_iter().find(|c| &c.remote == remote)
    }

    /// Most recently opened connection to `remote`.
    pub fn latest_to(&self, remote: &ConnectionId) -> Option<OpenedConnection> {
        self.opened().into_iter().rev().find(|c| &c.remote == remote)
    }

    pub fn open_now(
        &self,
        remote: &ConnectionId,
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> FakeConnection {
        let log = CallLog::default();
        let first = match self.opened.lock() {
            Ok(mut opened) => {
                opened.push(OpenedConnection {
                    remote: remote.clone(),
                    log: log.clone(),
                    events,
                });
                opened.len() == 1
            }
            Err(_) => false,
        };

        let label = if self.bare_label {
            self.label.clone()
        } else {
            format!("{}-{}", self.label, remote)
        };
        FakeConnection {
            fail_answer: self.fail_first_answer && first,
            ..FakeConnection::new(label, log)
        }
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn prepare(&self) -> Result<LocalMedia, ClientError> {
        if self.deny_media {
            return Err(ClientError::MediaUnavailable("permission denied".to_owned()));
        }
        Ok(LocalMedia::empty())
    }

    async fn open(
        &self,
        remote: &ConnectionId,
        _ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<MediaEvent>,
    ) -> Result<Box<dyn MediaConnection>, ClientError> {
        Ok(Box::new(self.open_now(remote, events)))
    }
}
