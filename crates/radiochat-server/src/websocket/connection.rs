//! Live relay connection: verified identity plus the serialized write half.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use futures::{Sink, SinkExt};
use radiochat_auth::{DisplayName, Identity};
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::protocol::Role;

/// Upper bound for writing a close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Write half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Process-unique connection number, assigned in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Write failures.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection was already terminated.
    #[error("connection closed")]
    Closed,
    /// The write did not finish within the write deadline.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    /// The transport reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
}

/// One authenticated peer.
///
/// Every write goes through a single async mutex so keepalive probes,
/// forwarded messages and close frames never interleave on the transport.
pub struct Connection {
    id: ConnectionId,
    role: Role,
    identity: Identity,
    display: DisplayName,
    sink: tokio::sync::Mutex<FrameSink>,
    cancel: CancellationToken,
    last_seen: parking_lot::Mutex<Instant>,
    write_wait: Duration,
}

impl Connection {
    /// Wrap a write half. `cancel` is the termination signal for this session.
    pub fn new(
        role: Role,
        identity: Identity,
        display: DisplayName,
        sink: FrameSink,
        cancel: CancellationToken,
        write_wait: Duration,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            role,
            identity,
            display,
            sink: tokio::sync::Mutex::new(sink),
            cancel,
            last_seen: parking_lot::Mutex::new(Instant::now()),
            write_wait,
        }
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Role fixed at upgrade time.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Verified identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Verified display name.
    pub fn display(&self) -> &DisplayName {
        &self.display
    }

    /// Send a text frame, bounded by the write deadline.
    pub async fn send_text(&self, text: Utf8Bytes) -> Result<(), ConnectionError> {
        self.write(Message::Text(text)).await
    }

    /// Send a liveness probe, bounded by the write deadline.
    pub async fn send_ping(&self) -> Result<(), ConnectionError> {
        self.write(Message::Ping(Bytes::new())).await
    }

    async fn write(&self, message: Message) -> Result<(), ConnectionError> {
        if self.cancel.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        let mut sink = self.sink.lock().await;
        match time::timeout(self.write_wait, sink.send(message)).await {
            Ok(result) => result.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::Timeout(self.write_wait)),
        }
    }

    /// Send a close frame with `code`, then terminate the session.
    ///
    /// The frame write is bounded by [`CLOSE_TIMEOUT`]. Failures are ignored;
    /// the peer is gone either way.
    pub async fn close_with(&self, code: u16, reason: &str) {
        let frame = Message::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from(reason),
        }));
        let _ = time::timeout(CLOSE_TIMEOUT, async move {
            let mut sink = self.sink.lock().await;
            sink.send(frame).await
        })
        .await;
        self.terminate();
    }

    /// Signal the owning session to end. Idempotent.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Whether termination has been signalled.
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once termination has been signalled.
    pub fn terminated(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Flush and close the write half.
    pub async fn close_transport(&self) {
        let _ = time::timeout(CLOSE_TIMEOUT, async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        })
        .await;
    }

    /// Record inbound activity from the peer.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Instant by which the peer must next be heard from.
    pub fn read_deadline(&self, pong_wait: Duration) -> Instant {
        *self.last_seen.lock() + pong_wait
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use futures::channel::mpsc;

    /// Connection whose writes land in an unbounded channel.
    pub(crate) fn channel_connection(
        role: Role,
        identity: &str,
    ) -> (Connection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded();
        let sink: FrameSink = Box::pin(tx.sink_map_err(axum::Error::new));
        let conn = Connection::new(
            role,
            Identity::from(identity),
            DisplayName::new(format!("{identity}-given"), format!("{identity}-family")),
            sink,
            CancellationToken::new(),
            Duration::from_secs(10),
        );
        (conn, rx)
    }
}
