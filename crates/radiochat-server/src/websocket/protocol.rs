//! Wire protocol: roles, frame shapes, and close codes.

use std::fmt;
use std::str::FromStr;

use radiochat_auth::{DisplayName, Identity};
use serde::{Deserialize, Serialize};

/// Session superseded by a newer connection with the same identity.
pub const CLOSE_SUPERSEDED: u16 = 4100;
/// Reason text sent with [`CLOSE_SUPERSEDED`].
pub const CLOSE_SUPERSEDED_REASON: &str = "replaced by new connection";
/// Radio admission key missing or wrong.
pub const CLOSE_INVALID_RADIO_KEY: u16 = 4103;
/// Reason text sent with [`CLOSE_INVALID_RADIO_KEY`].
pub const CLOSE_INVALID_RADIO_KEY_REASON: &str = "invalid radio key";
/// Handshake frame was not a JSON object of the expected shape.
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;
/// Handshake token was rejected.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Server is shutting down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Which side of the relay a connection belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A listener; broadcasts to every radio.
    User,
    /// Studio staff; replies to one user by identity.
    Radio,
}

impl Role {
    /// Lowercase name, as used on the wire and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Radio => "radio",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a `role` value other than `user` or `radio`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing ?role=user or ?role=radio")]
pub struct InvalidRole;

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "radio" => Ok(Self::Radio),
            _ => Err(InvalidRole),
        }
    }
}

/// Frame sent by a client. The first frame of a session is the handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IncomingMessage {
    /// Member token; only read at handshake.
    pub token: String,
    /// Target user identity, meaningful for radio senders.
    pub to: String,
    /// Message body.
    pub content: String,
    /// Radio admission key; only read at handshake.
    #[serde(rename = "radioKey")]
    pub radio_key: String,
}

impl IncomingMessage {
    /// Decode a frame payload.
    pub fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Whether the frame carries anything worth dispatching.
    pub fn has_payload(&self) -> bool {
        !self.content.trim().is_empty() || !self.to.trim().is_empty()
    }
}

/// Frame sent to a recipient, built from the sender's verified attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Sender identity.
    pub from: String,
    /// Sender given name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub given_name: String,
    /// Sender family name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family_name: String,
    /// Target identity from the incoming frame, surrounding whitespace removed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,
    /// Message body.
    pub content: String,
}

impl OutgoingMessage {
    /// Build an outgoing frame. `from` and the names never come from client input.
    pub fn new(sender: &Identity, display: &DisplayName, incoming: &IncomingMessage) -> Self {
        Self {
            from: sender.to_string(),
            given_name: display.given_name.clone(),
            family_name: display.family_name.clone(),
            to: incoming.to.trim().to_string(),
            content: incoming.content.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_parses_only_known_values() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("radio".parse::<Role>(), Ok(Role::Radio));
        assert_eq!("admin".parse::<Role>(), Err(InvalidRole));
        assert_eq!("".parse::<Role>(), Err(InvalidRole));
        assert_eq!("USER".parse::<Role>(), Err(InvalidRole));
    }

    #[test]
    fn invalid_role_message_matches_http_body() {
        assert_eq!(InvalidRole.to_string(), "missing ?role=user or ?role=radio");
    }

    #[test]
    fn role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Radio.to_string(), "radio");
    }

    #[test]
    fn incoming_fields_default_to_empty() {
        let msg = IncomingMessage::decode(br#"{"token":"t"}"#).unwrap();
        assert_eq!(msg.token, "t");
        assert!(msg.to.is_empty());
        assert!(msg.content.is_empty());
        assert!(msg.radio_key.is_empty());
    }

    #[test]
    fn incoming_reads_camel_case_radio_key() {
        let msg = IncomingMessage::decode(br#"{"token":"t","radioKey":"k","to":"1","content":"c"}"#)
            .unwrap();
        assert_eq!(msg.radio_key, "k");
        assert_eq!(msg.to, "1");
        assert_eq!(msg.content, "c");
    }

    #[test]
    fn incoming_rejects_non_object() {
        assert!(IncomingMessage::decode(b"not json").is_err());
        assert!(IncomingMessage::decode(b"[1,2]").is_err());
        assert!(IncomingMessage::decode(br#"{"content": 5}"#).is_err());
    }

    #[test]
    fn has_payload_ignores_whitespace() {
        let mut msg = IncomingMessage::default();
        assert!(!msg.has_payload());
        msg.content = "   ".into();
        assert!(!msg.has_payload());
        msg.to = "\t".into();
        assert!(!msg.has_payload());
        msg.to = "22222".into();
        assert!(msg.has_payload());
    }

    #[test]
    fn outgoing_omits_empty_optionals() {
        let incoming = IncomingMessage {
            content: "hi".into(),
            ..Default::default()
        };
        let out = OutgoingMessage::new(&Identity::from("1"), &DisplayName::default(), &incoming);
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value, json!({"from": "1", "content": "hi"}));
    }

    #[test]
    fn outgoing_carries_sender_attributes() {
        let incoming = IncomingMessage {
            token: "secret-token".into(),
            to: "22222".into(),
            content: "hello user".into(),
            radio_key: "key".into(),
        };
        let out = OutgoingMessage::new(
            &Identity::from("33333"),
            &DisplayName::new("Bob", "Radio"),
            &incoming,
        );
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "from": "33333",
                "given_name": "Bob",
                "family_name": "Radio",
                "to": "22222",
                "content": "hello user",
            })
        );
        assert!(value.get("token").is_none());
        assert!(value.get("radioKey").is_none());
    }

    #[test]
    fn outgoing_target_is_trimmed() {
        let incoming = IncomingMessage {
            to: " 22222 ".into(),
            content: "hi".into(),
            ..Default::default()
        };
        let sender = Identity::from("33333");
        let out = OutgoingMessage::new(&sender, &DisplayName::default(), &incoming);
        assert_eq!(out.to, "22222");

        let blank = IncomingMessage {
            to: "\t ".into(),
            ..Default::default()
        };
        let out = OutgoingMessage::new(&Identity::from("1"), &DisplayName::default(), &blank);
        assert!(serde_json::to_value(&out).unwrap().get("to").is_none());
    }

    #[test]
    fn outgoing_always_has_content_key() {
        let out = OutgoingMessage::new(
            &Identity::from("1"),
            &DisplayName::default(),
            &IncomingMessage::default(),
        );
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["content"], "");
    }
}
