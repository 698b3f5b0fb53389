//! Routing of decoded frames to their recipients.
//!
//! Users broadcast to every registered radio. Radios unicast to one user
//! named by `to`. A recipient whose write fails is dropped from the registry
//! and terminated; the sender is never told.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use futures::future::join_all;
use metrics::counter;
use radiochat_auth::Identity;
use tracing::{trace, warn};

use super::connection::Connection;
use super::protocol::{IncomingMessage, OutgoingMessage, Role};
use super::registry::Registry;
use crate::metrics::{RELAY_DELIVERY_FAILURES_TOTAL, RELAY_MESSAGES_FORWARDED_TOTAL};

/// What happened to a dispatched frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// User frame written to every radio in the snapshot.
    Broadcast {
        /// Radios that received it.
        delivered: usize,
        /// Radios dropped after a failed write.
        failed: usize,
    },
    /// Radio frame written to its target.
    Delivered,
    /// Radio frame without a target; dropped.
    NoTarget,
    /// Target user not online; dropped.
    TargetOffline,
    /// Write to the target failed; target dropped.
    DeliveryFailed,
}

/// Forwards frames through the registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Route `message` from `sender`.
    pub async fn dispatch(
        &self,
        sender: &Connection,
        message: &IncomingMessage,
    ) -> DispatchOutcome {
        let outgoing = OutgoingMessage::new(sender.identity(), sender.display(), message);
        match sender.role() {
            Role::User => self.broadcast_to_radios(&outgoing).await,
            Role::Radio => self.forward_to_user(&outgoing).await,
        }
    }

    async fn broadcast_to_radios(&self, outgoing: &OutgoingMessage) -> DispatchOutcome {
        let Some(payload) = encode(outgoing) else {
            return DispatchOutcome::Broadcast {
                delivered: 0,
                failed: 0,
            };
        };

        let radios = self.registry.snapshot_radios();
        trace!(user = %outgoing.from, radios = radios.len(), "forwarding message to radios");

        let results = join_all(radios.iter().map(|radio| {
            let payload = payload.clone();
            async move { (radio, radio.send_text(payload).await) }
        }))
        .await;

        let mut delivered = 0;
        let mut failed = 0;
        for (radio, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(error) => {
                    failed += 1;
                    warn!(
                        radio = %radio.identity(),
                        conn = %radio.id(),
                        %error,
                        "failed to forward to radio, removing"
                    );
                    self.drop_recipient(radio);
                }
            }
        }

        counter!(RELAY_MESSAGES_FORWARDED_TOTAL, "direction" => "user_to_radio")
            .increment(delivered as u64);
        trace!(user = %outgoing.from, delivered, failed, "message forwarded to radios");
        DispatchOutcome::Broadcast { delivered, failed }
    }

    async fn forward_to_user(&self, outgoing: &OutgoingMessage) -> DispatchOutcome {
        let target = outgoing.to.as_str();
        if target.is_empty() {
            trace!(radio = %outgoing.from, "radio message without target, dropping");
            return DispatchOutcome::NoTarget;
        }

        let Some(user) = self.registry.lookup_user(&Identity::from(target)) else {
            trace!(user = target, "target user offline, dropping");
            return DispatchOutcome::TargetOffline;
        };
        let Some(payload) = encode(outgoing) else {
            return DispatchOutcome::DeliveryFailed;
        };

        match user.send_text(payload).await {
            Ok(()) => {
                counter!(RELAY_MESSAGES_FORWARDED_TOTAL, "direction" => "radio_to_user")
                    .increment(1);
                trace!(user = target, "message forwarded to user");
                DispatchOutcome::Delivered
            }
            Err(error) => {
                warn!(
                    user = target,
                    conn = %user.id(),
                    %error,
                    "failed to forward message to user"
                );
                self.drop_recipient(&user);
                DispatchOutcome::DeliveryFailed
            }
        }
    }

    fn drop_recipient(&self, recipient: &Connection) {
        counter!(RELAY_DELIVERY_FAILURES_TOTAL).increment(1);
        let _ = self.registry.unregister(recipient);
        recipient.terminate();
    }
}

fn encode(outgoing: &OutgoingMessage) -> Option<Utf8Bytes> {
    match serde_json::to_string(outgoing) {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(error) => {
            warn!(%error, "failed to encode outgoing message");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
