//! WebSocket relay: connections, registry, dispatch, and session lifecycle.

pub mod connection;
pub mod dispatch;
pub mod keepalive;
pub mod protocol;
pub mod registry;
pub mod session;
