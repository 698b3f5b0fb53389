//! # radiochat-logging
//!
//! Structured logging with `tracing`.
//!
//! [`init_subscriber`] installs a global `fmt` subscriber writing to stderr in
//! either compact or JSON form. `RUST_LOG` wins over the configured level so
//! operators can raise verbosity for a single module without touching the
//! settings file.

#![deny(unsafe_code)]

use radiochat_settings::LogFormat;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Errors raised while configuring logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The configured level is neither a level name nor a filter directive.
    #[error("invalid log level {level:?}: {reason}")]
    InvalidLevel {
        /// The rejected value.
        level: String,
        /// Parser explanation.
        reason: String,
    },
}

/// Build the event filter for `level`.
///
/// A bare word must be a level name (`trace` … `error`, or `off`). Anything
/// containing `=` or `,` is parsed as a full `EnvFilter` directive list.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let level = level.trim();
    let invalid = |reason: String| LoggingError::InvalidLevel {
        level: level.to_string(),
        reason,
    };

    if level.contains('=') || level.contains(',') {
        return EnvFilter::try_new(level).map_err(|e| invalid(e.to_string()));
    }

    let filter: LevelFilter = level.parse().map_err(|e| invalid(format!("{e}")))?;
    Ok(EnvFilter::default().add_directive(filter.into()))
}

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum level or directive list, used when `RUST_LOG` is unset.
/// * `format` - Compact text or JSON lines.
pub fn init_subscriber(level: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails only when a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_accepted() {
        for level in ["trace", "debug", "info", "warn", "error", "off", "INFO"] {
            assert!(build_filter(level).is_ok(), "{level} should parse");
        }
    }

    #[test]
    fn directive_list_accepted() {
        assert!(build_filter("info,radiochat_server=trace").is_ok());
        assert!(build_filter("radiochat_server=debug").is_ok());
    }

    #[test]
    fn unknown_level_rejected() {
        let err = build_filter("loud").unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn init_subscriber_does_not_panic() {
        // Multiple calls should be safe (no-op after first)
        init_subscriber("warn", LogFormat::Compact).unwrap();
        init_subscriber("debug", LogFormat::Json).unwrap();
    }
}
