//! Relay session lifecycle: one connected client from upgrade through
//! teardown.
//!
//! 1. Reads the handshake frame and verifies its token (and radio key)
//! 2. Registers the connection, superseding an older user session
//! 3. Dispatches the handshake payload if it carries one
//! 4. Runs keepalive probes alongside the read loop
//! 5. Tears down exactly once, whatever ended the read loop

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures::StreamExt;
use futures::stream::SplitStream;
use metrics::{counter, gauge};
use radiochat_auth::{AuthError, TokenVerifier, VerifiedToken};
use radiochat_settings::{ConnectionSettings, ExpiryMode, RadiochatSettings};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};

use super::connection::{CLOSE_TIMEOUT, Connection};
use super::dispatch::Dispatcher;
use super::keepalive::run_keepalive;
use super::protocol::{
    CLOSE_GOING_AWAY, CLOSE_INVALID_PAYLOAD, CLOSE_INVALID_RADIO_KEY,
    CLOSE_INVALID_RADIO_KEY_REASON, CLOSE_POLICY_VIOLATION, CLOSE_SUPERSEDED,
    CLOSE_SUPERSEDED_REASON, IncomingMessage, Role,
};
use super::registry::Registry;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
    WS_HANDSHAKE_REJECTIONS_TOTAL, WS_SESSIONS_SUPERSEDED_TOTAL,
};

/// Why a handshake was refused.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The peer went away before sending a data frame.
    #[error("connection closed before handshake")]
    Disconnected,
    /// No data frame arrived within the read deadline.
    #[error("no handshake within {0:?}")]
    TimedOut(Duration),
    /// The server began shutting down mid-handshake.
    #[error("server shutting down")]
    ShuttingDown,
    /// The first frame was not a valid message object.
    #[error("invalid handshake frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The token failed verification.
    #[error("invalid token at handshake: {0}")]
    Auth(#[from] AuthError),
    /// A radio presented a missing or wrong admission key.
    #[error("invalid radio key")]
    InvalidRadioKey,
}

impl HandshakeError {
    /// Close code and reason to send before dropping the transport, if any.
    pub fn close_frame(&self) -> Option<(u16, &'static str)> {
        match self {
            Self::Disconnected | Self::TimedOut(_) => None,
            Self::ShuttingDown => Some((CLOSE_GOING_AWAY, "server shutting down")),
            Self::Malformed(_) => Some((CLOSE_INVALID_PAYLOAD, "invalid json")),
            Self::Auth(_) => Some((CLOSE_POLICY_VIOLATION, "invalid token")),
            Self::InvalidRadioKey => {
                Some((CLOSE_INVALID_RADIO_KEY, CLOSE_INVALID_RADIO_KEY_REASON))
            }
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::TimedOut(_) => "timeout",
            Self::ShuttingDown => "shutdown",
            Self::Malformed(_) => "malformed",
            Self::Auth(e) => e.reason(),
            Self::InvalidRadioKey => "invalid_radio_key",
        }
    }
}

/// What ended a registered session's read loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent a close frame.
    PeerClosed,
    /// The transport failed.
    TransportError,
    /// Nothing was heard from the peer within the read deadline.
    ReadTimeout,
    /// Terminated from outside: eviction, failed delivery, failed probe, or shutdown.
    Terminated,
    /// The stream ended without a close frame.
    StreamEnded,
}

/// Everything a session needs, shared by all sessions.
pub struct SessionContext {
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    verifier: TokenVerifier,
    expiry: ExpiryMode,
    radio_key: String,
    timing: ConnectionSettings,
}

impl SessionContext {
    /// Build from validated settings.
    pub fn new(settings: &RadiochatSettings, registry: Arc<Registry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            verifier: TokenVerifier::new(settings.auth.secret.as_bytes()),
            expiry: settings.auth.expiry,
            radio_key: settings.auth.radio_key.clone(),
            timing: settings.connection.clone(),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Connection timing in effect.
    pub fn timing(&self) -> &ConnectionSettings {
        &self.timing
    }

    /// Verify a decoded handshake frame for `role`.
    ///
    /// The token is checked first; radios must then present the configured
    /// admission key. An empty configured key admits no radio.
    pub fn authenticate(
        &self,
        role: Role,
        handshake: &IncomingMessage,
    ) -> Result<VerifiedToken, HandshakeError> {
        let verified = self.verifier.verify(&handshake.token, self.expiry)?;
        if role == Role::Radio
            && (self.radio_key.is_empty() || handshake.radio_key != self.radio_key)
        {
            return Err(HandshakeError::InvalidRadioKey);
        }
        Ok(verified)
    }
}

/// Run a relay session on an upgraded socket.
#[instrument(skip_all, fields(role = %role, identity = tracing::field::Empty))]
pub async fn run_session(
    mut socket: WebSocket,
    role: Role,
    ctx: Arc<SessionContext>,
    shutdown: CancellationToken,
) {
    let handshake = read_handshake(&mut socket, ctx.timing.pong_wait(), &shutdown)
        .await
        .and_then(|first| ctx.authenticate(role, &first).map(|verified| (first, verified)));

    let (first, verified) = match handshake {
        Ok(ok) => ok,
        Err(error) => {
            warn!(%error, "closing connection: handshake rejected");
            counter!(WS_HANDSHAKE_REJECTIONS_TOTAL, "reason" => error.reason()).increment(1);
            if let Some((code, reason)) = error.close_frame() {
                let frame = Message::Close(Some(CloseFrame {
                    code,
                    reason: Utf8Bytes::from_static(reason),
                }));
                let _ = time::timeout(CLOSE_TIMEOUT, socket.send(frame)).await;
            }
            return;
        }
    };

    let _ = Span::current().record("identity", verified.identity.as_str());
    let (sink, mut stream) = socket.split();
    let conn = Arc::new(Connection::new(
        role,
        verified.identity,
        verified.display,
        Box::pin(sink),
        shutdown.child_token(),
        ctx.timing.write_wait(),
    ));

    if let Some(evicted) = ctx.registry.register(conn.clone()) {
        warn!(
            conn = %conn.id(),
            evicted = %evicted.id(),
            "replacing connection: replaced by new connection"
        );
        counter!(WS_SESSIONS_SUPERSEDED_TOTAL).increment(1);
        let _ = tokio::spawn(async move {
            evicted
                .close_with(CLOSE_SUPERSEDED, CLOSE_SUPERSEDED_REASON)
                .await;
        });
    }

    info!(conn = %conn.id(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).increment(1.0);

    if first.has_payload() {
        let _ = ctx.dispatcher.dispatch(&conn, &first).await;
    }

    let keepalive = tokio::spawn(run_keepalive(conn.clone(), ctx.timing.ping_period()));
    let end = read_loop(&ctx, &conn, &mut stream).await;

    // Teardown: the only exit path for a registered session.
    let removed = ctx.registry.unregister(&conn);
    conn.terminate();
    keepalive.abort();
    if shutdown.is_cancelled() {
        conn.close_with(CLOSE_GOING_AWAY, "server shutting down").await;
    }
    conn.close_transport().await;

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE, "role" => role.as_str()).decrement(1.0);
    info!(conn = %conn.id(), ?end, removed, "client disconnected");
}

/// Wait for the first data frame, bounded by `wait`.
async fn read_handshake(
    socket: &mut WebSocket,
    wait: Duration,
    shutdown: &CancellationToken,
) -> Result<IncomingMessage, HandshakeError> {
    let deadline = Instant::now() + wait;
    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => return Err(HandshakeError::ShuttingDown),
            next = time::timeout_at(deadline, socket.recv()) => next,
        };
        let frame = match next {
            Err(_) => return Err(HandshakeError::TimedOut(wait)),
            Ok(None | Some(Err(_))) => return Err(HandshakeError::Disconnected),
            Ok(Some(Ok(frame))) => frame,
        };
        match frame {
            Message::Text(text) => return Ok(IncomingMessage::decode(text.as_str().as_bytes())?),
            Message::Binary(data) => return Ok(IncomingMessage::decode(&data)?),
            Message::Close(_) => return Err(HandshakeError::Disconnected),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

async fn read_loop(
    ctx: &SessionContext,
    conn: &Connection,
    stream: &mut SplitStream<WebSocket>,
) -> SessionEnd {
    let pong_wait = ctx.timing.pong_wait();
    loop {
        let deadline = conn.read_deadline(pong_wait);
        let next = tokio::select! {
            biased;
            () = conn.terminated() => return SessionEnd::Terminated,
            next = time::timeout_at(deadline, stream.next()) => next,
        };
        let frame = match next {
            Err(_) => return SessionEnd::ReadTimeout,
            Ok(None) => return SessionEnd::StreamEnded,
            Ok(Some(Err(error))) => {
                debug!(%error, "read failed");
                return SessionEnd::TransportError;
            }
            Ok(Some(Ok(frame))) => frame,
        };
        conn.touch();

        let payload: &[u8] = match &frame {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(data) => &data[..],
            Message::Close(_) => return SessionEnd::PeerClosed,
            Message::Ping(_) | Message::Pong(_) => continue,
        };
        match IncomingMessage::decode(payload) {
            Ok(message) => {
                let _ = ctx.dispatcher.dispatch(conn, &message).await;
            }
            Err(error) => warn!(%error, "invalid json"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
