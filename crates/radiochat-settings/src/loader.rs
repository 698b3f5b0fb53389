//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RadiochatSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{
    ExpiryMode, LogFormat, MAX_MESSAGE_SIZE_RANGE, RadiochatSettings, TIMER_SECS_RANGE,
    WRITE_WAIT_SECS_RANGE,
};

/// Environment variable naming an optional settings file.
pub const SETTINGS_PATH_ENV: &str = "RADIOCHAT_SETTINGS";

/// Resolve the settings file path from [`SETTINGS_PATH_ENV`], if set.
pub fn settings_path() -> Option<PathBuf> {
    read_env_string(SETTINGS_PATH_ENV).map(PathBuf::from)
}

/// Load settings from the env-named file (if any) with env var overrides.
pub fn load_settings() -> Result<RadiochatSettings> {
    load_settings_from(settings_path().as_deref())
}

/// Load settings from an optional file path with env var overrides.
///
/// A missing file yields defaults. A file with invalid JSON is an error.
pub fn load_settings_from(path: Option<&Path>) -> Result<RadiochatSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings using `env` as the environment lookup.
pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<RadiochatSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading settings from file");
            load_file(path)?
        }
        Some(path) => {
            debug!(?path, "settings file not found, using defaults");
            RadiochatSettings::default()
        }
        None => RadiochatSettings::default(),
    };

    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Deep-merge the file at `path` over the compiled defaults.
fn load_file(path: &Path) -> Result<RadiochatSettings> {
    let malformed = |source: serde_json::Error| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(malformed)?;
    let defaults = serde_json::to_value(RadiochatSettings::default())?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(malformed)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Variable names follow the relay's deployment conventions (`PORT`,
/// `GEWIS_SECRET`, `RADIO_*`). Empty values are ignored; unparseable values
/// are ignored with a warning.
pub fn apply_env_overrides<F>(settings: &mut RadiochatSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| env(name).filter(|v| !v.is_empty());

    // ── Server / logging ────────────────────────────────────────────
    if let Some(v) = string("PORT") {
        settings.server.listen = v;
    }
    if let Some(v) = string("LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("LOG_FORMAT") {
        match v.to_ascii_lowercase().as_str() {
            "compact" => settings.logging.format = LogFormat::Compact,
            "json" => settings.logging.format = LogFormat::Json,
            _ => tracing::warn!(key = "LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = string("GEWIS_SECRET") {
        settings.auth.secret = v;
    }
    if let Some(v) = string("RADIO_CHAT_KEY") {
        settings.auth.radio_key = v;
    }
    if let Some(v) = string("TOKEN_EXPIRY") {
        match v.parse::<ExpiryMode>() {
            Ok(mode) => settings.auth.expiry = mode,
            Err(_) => {
                tracing::warn!(key = "TOKEN_EXPIRY", value = %v, "invalid expiry mode, ignoring");
            }
        }
    }

    // ── Connection timers ───────────────────────────────────────────
    if let Some(v) = read_u64(&string, "RADIOCHAT_PING_PERIOD_SECS", &TIMER_SECS_RANGE) {
        settings.connection.ping_period_secs = v;
    }
    if let Some(v) = read_u64(&string, "RADIOCHAT_PONG_WAIT_SECS", &TIMER_SECS_RANGE) {
        settings.connection.pong_wait_secs = v;
    }
    if let Some(v) = read_u64(&string, "RADIOCHAT_WRITE_WAIT_SECS", &WRITE_WAIT_SECS_RANGE) {
        settings.connection.write_wait_secs = v;
    }
    if let Some(v) = read_u64(&string, "RADIOCHAT_MAX_MESSAGE_SIZE", &MAX_MESSAGE_SIZE_RANGE) {
        settings.connection.max_message_size = usize::try_from(v).unwrap_or(usize::MAX);
    }

    // ── Stream metadata ─────────────────────────────────────────────
    if let Some(v) = string("RADIO_VIDEO_URL") {
        settings.stream.video_url = v;
    }
    if let Some(v) = string("RADIO_AUDIO_URL") {
        settings.stream.audio_url = v;
    }
    if let Some(v) = string("RADIO_AUDIO_MOUNT_POINT") {
        settings.stream.audio_mount_point = v;
    }
    if let Some(v) = string("RADIO_START_TIME") {
        settings.stream.start_time = v;
    }
    if let Some(v) = string("RADIO_GEWIS_TOKEN") {
        settings.stream.public_token = v;
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_u64<F>(string: &F, name: &str, range: &RangeInclusive<u64>) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let val = string(name)?;
    let result = parse_u64_range(&val, *range.start(), *range.end());
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
