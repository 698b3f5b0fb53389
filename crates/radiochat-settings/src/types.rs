//! Settings types with compiled defaults.
//!
//! Every struct uses `#[serde(default)]` so a partial settings file only has
//! to name the values it overrides.

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RadiochatSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
    /// Token verification and radio admission.
    pub auth: AuthSettings,
    /// Per-connection timers and limits.
    pub connection: ConnectionSettings,
    /// Informational stream metadata served over HTTP.
    pub stream: StreamSettings,
}

impl RadiochatSettings {
    /// Check ranges and cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        if self.auth.secret.is_empty() {
            return Err(SettingsError::EmptySecret);
        }
        let _ = self.server.bind_address()?;
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen address: `host:port`, `:port`, or a bare port number.
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: ":8080".to_string(),
        }
    }
}

impl ServerSettings {
    /// Normalize [`Self::listen`] into a `host:port` string suitable for binding.
    ///
    /// An omitted host binds every interface.
    pub fn bind_address(&self) -> Result<String> {
        let listen = self.listen.trim();
        let (host, port) = match listen.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => ("", listen),
        };
        if port.parse::<u16>().is_err() {
            return Err(SettingsError::InvalidListen(listen.to_string()));
        }
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(format!("{host}:{port}"))
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`) or a full
    /// `EnvFilter` directive. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// How token expiry is treated during verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryMode {
    /// Expired tokens are rejected and `exp` is required.
    Strict,
    /// Expired tokens are accepted; the expiry is reported and logged.
    #[default]
    Lenient,
}

impl std::str::FromStr for ExpiryMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(SettingsError::UnknownExpiryMode(s.to_string())),
        }
    }
}

/// Token verification and radio admission settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Shared HS512 secret used by the identity provider to sign tokens.
    pub secret: String,
    /// Shared key radios must present in their handshake. Empty rejects every radio.
    pub radio_key: String,
    /// Expiry policy applied to handshake tokens.
    pub expiry: ExpiryMode,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret: "ChangeMe".to_string(),
            radio_key: "ChangeMe".to_string(),
            expiry: ExpiryMode::Lenient,
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("radio_key", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Accepted `pingPeriodSecs` and `pongWaitSecs`.
pub const TIMER_SECS_RANGE: RangeInclusive<u64> = 1..=3_600;

/// Accepted `writeWaitSecs`.
pub const WRITE_WAIT_SECS_RANGE: RangeInclusive<u64> = 1..=600;

/// Accepted `maxMessageSize` in bytes.
pub const MAX_MESSAGE_SIZE_RANGE: RangeInclusive<u64> = 1_024..=16 * 1_024 * 1_024;

/// Per-connection timers and limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Interval between server-initiated Ping frames.
    pub ping_period_secs: u64,
    /// Read deadline; refreshed by every frame received from the peer.
    pub pong_wait_secs: u64,
    /// Upper bound on a single frame write.
    pub write_wait_secs: u64,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_period_secs: 25,
            pong_wait_secs: 60,
            write_wait_secs: 10,
            max_message_size: 64 * 1024,
        }
    }
}

impl ConnectionSettings {
    /// Reject values outside their ranges, and pings that cannot beat the
    /// read deadline.
    pub fn validate(&self) -> Result<()> {
        check_range("pingPeriodSecs", self.ping_period_secs, &TIMER_SECS_RANGE)?;
        check_range("pongWaitSecs", self.pong_wait_secs, &TIMER_SECS_RANGE)?;
        check_range("writeWaitSecs", self.write_wait_secs, &WRITE_WAIT_SECS_RANGE)?;
        let max_message_size = u64::try_from(self.max_message_size).unwrap_or(u64::MAX);
        check_range("maxMessageSize", max_message_size, &MAX_MESSAGE_SIZE_RANGE)?;
        if self.ping_period_secs >= self.pong_wait_secs {
            return Err(SettingsError::PingOutlastsDeadline {
                ping: self.ping_period_secs,
                pong: self.pong_wait_secs,
            });
        }
        Ok(())
    }

    /// Ping period as a [`Duration`].
    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }

    /// Read deadline as a [`Duration`].
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Write bound as a [`Duration`].
    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }
}

fn check_range(field: &'static str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Metadata about the external audio/video stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// HLS video URL.
    pub video_url: String,
    /// Icecast host serving the audio stream.
    pub audio_url: String,
    /// Icecast mount point.
    pub audio_mount_point: String,
    /// Broadcast start time (RFC 3339).
    pub start_time: String,
    /// Public token handed out to stream listeners.
    pub public_token: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            video_url: "https://hd-auth.skylinewebcams.com/live.m3u8?a=2j5v70ov5ng6jq544ji0u6kjh3"
                .to_string(),
            audio_url: "bata-radio.snt.utwente.nl".to_string(),
            audio_mount_point: "/high".to_string(),
            start_time: "2025-08-18T07:00:00Z".to_string(),
            public_token: "gewis-radio".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RadiochatSettings::default().validate().unwrap();
    }

    #[test]
    fn default_connection_timers() {
        let c = ConnectionSettings::default();
        assert_eq!(c.ping_period(), Duration::from_secs(25));
        assert_eq!(c.pong_wait(), Duration::from_secs(60));
        assert_eq!(c.write_wait(), Duration::from_secs(10));
    }

    #[test]
    fn bind_address_forms() {
        let bind = |listen: &str| {
            ServerSettings {
                listen: listen.into(),
            }
            .bind_address()
        };
        assert_eq!(bind(":8080").unwrap(), "0.0.0.0:8080");
        assert_eq!(bind("9000").unwrap(), "0.0.0.0:9000");
        assert_eq!(bind("127.0.0.1:0").unwrap(), "127.0.0.1:0");
        assert!(matches!(bind("localhost"), Err(SettingsError::InvalidListen(_))));
        assert!(bind(":http").is_err());
    }

    #[test]
    fn ping_period_must_be_shorter_than_pong_wait() {
        let mut settings = RadiochatSettings::default();
        settings.connection.ping_period_secs = 60;
        settings.connection.pong_wait_secs = 60;
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err,
            SettingsError::PingOutlastsDeadline { ping: 60, pong: 60 }
        ));
        assert!(err.to_string().contains("pingPeriodSecs"));
    }

    #[test]
    fn zero_timer_rejected() {
        let mut settings = RadiochatSettings::default();
        settings.connection.write_wait_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::OutOfRange { field: "writeWaitSecs", value: 0, .. })
        ));
    }

    #[test]
    fn huge_read_deadline_rejected() {
        let mut settings = RadiochatSettings::default();
        settings.connection.pong_wait_secs = u64::MAX;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::OutOfRange { field: "pongWaitSecs", max: 3_600, .. })
        ));
    }

    #[test]
    fn message_size_bounds() {
        let mut c = ConnectionSettings {
            max_message_size: 0,
            ..ConnectionSettings::default()
        };
        assert!(matches!(
            c.validate(),
            Err(SettingsError::OutOfRange { field: "maxMessageSize", .. })
        ));
        c.max_message_size = 1_024;
        c.validate().unwrap();
        c.max_message_size = 16 * 1_024 * 1_024 + 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn range_edges_accepted() {
        let c = ConnectionSettings {
            ping_period_secs: 3_599,
            pong_wait_secs: 3_600,
            write_wait_secs: 600,
            max_message_size: 16 * 1_024 * 1_024,
        };
        c.validate().unwrap();
    }

    #[test]
    fn empty_secret_rejected() {
        let mut settings = RadiochatSettings::default();
        settings.auth.secret.clear();
        assert!(matches!(settings.validate(), Err(SettingsError::EmptySecret)));
    }

    #[test]
    fn expiry_mode_from_str() {
        assert_eq!("strict".parse::<ExpiryMode>().unwrap(), ExpiryMode::Strict);
        assert_eq!("LENIENT".parse::<ExpiryMode>().unwrap(), ExpiryMode::Lenient);
        assert!(matches!(
            "sometimes".parse::<ExpiryMode>(),
            Err(SettingsError::UnknownExpiryMode(mode)) if mode == "sometimes"
        ));
    }

    #[test]
    fn auth_debug_redacts_secrets() {
        let auth = AuthSettings {
            secret: "hunter2".into(),
            radio_key: "letmein".into(),
            expiry: ExpiryMode::Strict,
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("letmein"));
        assert!(debug.contains("Strict"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: RadiochatSettings = serde_json::from_str(
            r#"{"auth":{"expiry":"strict"},"connection":{"pingPeriodSecs":5}}"#,
        )
        .unwrap();
        assert_eq!(settings.auth.expiry, ExpiryMode::Strict);
        assert_eq!(settings.auth.secret, "ChangeMe");
        assert_eq!(settings.connection.ping_period_secs, 5);
        assert_eq!(settings.connection.pong_wait_secs, 60);
        assert_eq!(settings.server.listen, ":8080");
    }

    #[test]
    fn log_format_serde() {
        let f: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(f, LogFormat::Json);
        assert_eq!(serde_json::to_string(&LogFormat::Compact).unwrap(), r#""compact""#);
    }
}
