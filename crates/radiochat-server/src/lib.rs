//! # radiochat-server
//!
//! Axum HTTP + `WebSocket` relay between radio listeners and studio staff.
//!
//! - `WebSocket` gateway: handshake and token verification, registry with
//!   per-identity supersession, broadcast/unicast dispatch, keepalive
//! - HTTP endpoints: health, stream info, public token, Prometheus metrics
//! - Graceful shutdown that waits for every session to close

#![deny(unsafe_code)]

pub mod api;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use server::{AppState, RadiochatServer, ServerError};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome};
