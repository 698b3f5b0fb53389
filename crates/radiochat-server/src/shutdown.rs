//! Relay shutdown: stop accepting, tell every session to close, wait for
//! their teardown.
//!
//! Upgraded WebSocket sessions outlive the HTTP connection that produced
//! them, so `axum::serve` does not wait for them. Each session future is
//! wrapped with [`ShutdownCoordinator::track_session`], and
//! [`ShutdownCoordinator::graceful_shutdown`] drains both the serve task and
//! the tracked sessions under one deadline.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long sessions get to send their going-away close and unregister.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The serve task and every session finished.
    Drained,
    /// The deadline passed. The serve task was aborted; `sessions` were
    /// still tearing down.
    TimedOut {
        /// Sessions still running at the deadline.
        sessions: usize,
    },
}

/// Owns the root cancellation token and the set of live sessions.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no sessions.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// Root token. Sessions hold children of it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Count `session` as live until it completes.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions started and not yet torn down.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel every session. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
        let _ = self.sessions.close();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel, then wait up to `timeout` for `handles` and every tracked
    /// session. On timeout the handles are aborted.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> ShutdownOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        info!(
            sessions = self.active_sessions(),
            timeout_secs = timeout.as_secs(),
            "closing relay sessions"
        );

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = async {
            let _ = join_all(handles).await;
            self.sessions.wait().await;
        };

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            info!("all relay sessions closed");
            return ShutdownOutcome::Drained;
        }

        for abort in &aborts {
            abort.abort();
        }
        let sessions = self.active_sessions();
        warn!(sessions, "shutdown timed out after {timeout:?}");
        ShutdownOutcome::TimedOut { sessions }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
