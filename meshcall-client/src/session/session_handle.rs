use meshcall_core::{ConnectionId, Signal};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

pub enum SessionCommand {
    Signal(Signal),
    /// Stops the session. `done` fires once its connection is closed.
    Close { done: oneshot::Sender<()> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnection gave up. Sent at most once, after which the session is gone.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub remote: ConnectionId,
    pub kind: SessionEventKind,
}

/// Owner's end of a running peer session.
pub struct SessionHandle {
    remote: ConnectionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn new(
        remote: ConnectionId,
        commands: mpsc::UnboundedSender<SessionCommand>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            remote,
            commands,
            task,
        }
    }

    pub fn remote(&self) -> &ConnectionId {
        &self.remote
    }

    /// Queues an inbound signal. Returns false if the session already ended.
    pub fn signal(&self, signal: Signal) -> bool {
        self.commands.send(SessionCommand::Signal(signal)).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the session and waits for it to stop. Returns whether this call closed it.
    pub async fn close(self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::Close { done: done_tx })
            .is_err()
        {
            debug!("Session {} already stopped", self.remote);
            return false;
        }

        let closed = done_rx.await.is_ok();
        let _ = self.task.await;
        closed
    }
}
