use std::fmt;
use std::sync::Arc;

use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer typed `exit` or the exec command finished.
    Completed,
    PeerClosed,
    TransportError,
    TimedOut,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Completed => write!(f, "completed"),
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::TransportError => write!(f, "transport error"),
            CloseReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// One-shot close signal shared by a session and its watchdog.
///
/// The first [`close`](SessionCloser::close) wins; every later call is a
/// no-op and reports `false`.
#[derive(Clone)]
pub struct SessionCloser {
    state: Arc<watch::Sender<Option<CloseReason>>>,
}

impl SessionCloser {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn close(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<CloseReason> {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the session is closed, with the winning reason.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.state.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives in `self`, so this never fails while we wait.
            if rx.changed().await.is_err() {
                return CloseReason::Completed;
            }
        }
    }
}

impl Default for SessionCloser {
    fn default() -> Self {
        Self::new()
    }
}

/// Closes the session with [`CloseReason::TimedOut`] once `deadline` passes.
/// The deadline is fixed; activity does not extend it.
pub fn spawn_watchdog(
    closer: SessionCloser,
    deadline: Instant,
    session_id: Uuid,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = sleep_until(deadline) => {
                if closer.close(CloseReason::TimedOut) {
                    info!("[{}] Session deadline reached, closing", session_id);
                }
            }
            _ = closer.closed() => {}
        }
    })
}
