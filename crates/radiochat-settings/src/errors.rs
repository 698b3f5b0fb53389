//! Why a relay configuration was refused.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or validating [`crate::RadiochatSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file {path:?}: {source}")]
    Read {
        /// File we tried to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a value has the wrong type.
    #[error("settings file {path:?} is malformed: {source}")]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// Parse or type error.
        #[source]
        source: serde_json::Error,
    },
    /// Compiled defaults could not be turned into a JSON document.
    #[error("failed to encode default settings: {0}")]
    Encode(#[from] serde_json::Error),
    /// A connection timer or size limit lies outside its accepted range.
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        /// Settings key, as spelled in the settings file.
        field: &'static str,
        /// Configured value.
        value: u64,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },
    /// Pings would not reach the peer before its read deadline expires.
    #[error("pingPeriodSecs ({ping}) must be shorter than pongWaitSecs ({pong})")]
    PingOutlastsDeadline {
        /// Configured ping period in seconds.
        ping: u64,
        /// Configured read deadline in seconds.
        pong: u64,
    },
    /// The listen address has no usable port.
    #[error("listen address {0:?} has no valid port")]
    InvalidListen(String),
    /// Tokens cannot be verified without a signing secret.
    #[error("auth secret must not be empty")]
    EmptySecret,
    /// `TOKEN_EXPIRY` named neither `strict` nor `lenient`.
    #[error("unknown token expiry mode {0:?}, expected strict or lenient")]
    UnknownExpiryMode(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
