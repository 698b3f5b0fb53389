//! # radiochat-settings
//!
//! Configuration for the radiochat relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RadiochatSettings::default()`]
//! 2. **Settings file**: optional JSON file (deep-merged over defaults)
//! 3. **Environment variables**: `PORT`, `GEWIS_SECRET`, `RADIO_*`, ... (highest priority)
//!
//! The loaded value is validated and then passed explicitly to the server;
//! there is no global settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    SETTINGS_PATH_ENV, apply_env_overrides, deep_merge, load_settings, load_settings_from,
    load_with_env, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RadiochatSettings::default();
        let _mode = ExpiryMode::default();
        assert_eq!(SETTINGS_PATH_ENV, "RADIOCHAT_SETTINGS");
    }

    #[test]
    fn default_settings_match_deployment_defaults() {
        let settings = RadiochatSettings::default();
        assert_eq!(settings.server.listen, ":8080");
        assert_eq!(settings.auth.secret, "ChangeMe");
        assert_eq!(settings.auth.radio_key, "ChangeMe");
        assert_eq!(settings.stream.public_token, "gewis-radio");
        assert_eq!(settings.stream.audio_mount_point, "/high");
        assert_eq!(settings.connection.ping_period_secs, 25);
        assert_eq!(settings.connection.pong_wait_secs, 60);
    }
}
