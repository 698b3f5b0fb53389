//! Periodic liveness probes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::connection::Connection;

/// Outcome of the keepalive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// A ping write failed; the connection has been terminated.
    ProbeFailed,
    /// The connection was terminated by someone else.
    Cancelled,
}

/// Send a Ping on `connection` every `period` until it terminates.
///
/// The first probe goes out one full period after start. A failed probe
/// terminates the connection, which ends its read loop.
pub async fn run_keepalive(connection: Arc<Connection>, period: Duration) -> KeepaliveResult {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = connection.send_ping().await {
                    debug!(conn = %connection.id(), %error, "keepalive probe failed");
                    connection.terminate();
                    return KeepaliveResult::ProbeFailed;
                }
            }
            () = connection.terminated() => {
                return KeepaliveResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::channel_connection;
    use crate::websocket::protocol::Role;
    use assert_matches::assert_matches;
    use axum::extract::ws::Message;
    use futures::{FutureExt, StreamExt};

    #[tokio::test]
    async fn keepalive_cancelled() {
        let (conn, _rx) = channel_connection(Role::User, "1");
        let conn = Arc::new(conn);
        let handle = tokio::spawn(run_keepalive(conn.clone(), Duration::from_secs(100)));

        conn.terminate();
        let result = handle.await.unwrap();
        assert_eq!(result, KeepaliveResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn pings_every_period() {
        let (conn, mut rx) = channel_connection(Role::Radio, "1");
        let conn = Arc::new(conn);
        let start = time::Instant::now();
        let handle = tokio::spawn(run_keepalive(conn.clone(), Duration::from_secs(25)));

        assert_matches!(rx.next().await, Some(Message::Ping(_)));
        assert!(start.elapsed() >= Duration::from_secs(25));
        assert_matches!(rx.next().await, Some(Message::Ping(_)));
        assert!(start.elapsed() >= Duration::from_secs(50));
        assert!(start.elapsed() < Duration::from_secs(75));

        conn.terminate();
        assert_eq!(handle.await.unwrap(), KeepaliveResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_terminates_connection() {
        let (conn, rx) = channel_connection(Role::User, "1");
        drop(rx);
        let conn = Arc::new(conn);

        let result = run_keepalive(conn.clone(), Duration::from_secs(25)).await;
        assert_eq!(result, KeepaliveResult::ProbeFailed);
        assert!(conn.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn no_probe_before_first_period() {
        let (conn, mut rx) = channel_connection(Role::User, "1");
        let conn = Arc::new(conn);
        let _handle = tokio::spawn(run_keepalive(conn.clone(), Duration::from_secs(25)));

        time::sleep(Duration::from_secs(24)).await;
        assert!(rx.next().now_or_never().is_none(), "nothing sent yet");
        conn.terminate();
    }

    #[test]
    fn keepalive_result_debug() {
        let debug = format!("{:?}", KeepaliveResult::ProbeFailed);
        assert!(debug.contains("ProbeFailed"));
    }
}
