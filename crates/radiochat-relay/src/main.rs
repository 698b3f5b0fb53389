//! # radiochat-relay
//!
//! radiochat relay binary: loads settings, initializes logging and metrics,
//! and serves the WebSocket relay until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use radiochat_server::{RadiochatServer, ShutdownOutcome};
use radiochat_settings::RadiochatSettings;
use tracing::{info, warn};

/// Signing secret shipped as a default; never meant for production.
const PLACEHOLDER_SECRET: &str = "ChangeMe";

/// Real-time chat relay between radio listeners and studio staff.
#[derive(Parser, Debug)]
#[command(name = "radiochat-relay", about = "radiochat WebSocket relay")]
struct Cli {
    /// Path to a JSON settings file (overrides `RADIOCHAT_SETTINGS`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (`host:port`, `:port`, or a port), overriding `PORT`.
    #[arg(long)]
    port: Option<String>,
}

/// Settings from file and environment, with CLI overrides applied last.
fn resolve_settings<F>(cli: &Cli, env: F) -> Result<RadiochatSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let path = cli
        .config
        .clone()
        .or_else(|| env(radiochat_settings::SETTINGS_PATH_ENV).map(PathBuf::from));
    let mut settings = radiochat_settings::load_with_env(path.as_deref(), &env)
        .context("Failed to load settings")?;

    if let Some(listen) = &cli.port {
        settings.server.listen.clone_from(listen);
        settings.validate().context("Invalid --port")?;
    }
    Ok(settings)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli, |name| std::env::var(name).ok())?;

    radiochat_logging::init_subscriber(&settings.logging.level, settings.logging.format)
        .context("Failed to initialize logging")?;
    if settings.auth.secret == PLACEHOLDER_SECRET {
        warn!("GEWIS_SECRET is not set, verifying tokens with the placeholder secret");
    }
    info!(expiry = ?settings.auth.expiry, "token expiry policy");

    let metrics = radiochat_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = RadiochatServer::new(settings).with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!("radiochat relay listening on http://{addr}");

    shutdown_signal().await?;

    info!("Shutting down...");
    match server.shutdown().graceful_shutdown(vec![handle], None).await {
        ShutdownOutcome::Drained => info!("Shutdown complete"),
        ShutdownOutcome::TimedOut { sessions } => {
            warn!(sessions, "Shutdown deadline passed with sessions still closing");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["radiochat-relay"]);
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from([
            "radiochat-relay",
            "--config",
            "/etc/radiochat.json",
            "--port",
            "9000",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/radiochat.json")));
        assert_eq!(cli.port.as_deref(), Some("9000"));
    }

    #[test]
    fn port_flag_beats_env() {
        let cli = Cli::parse_from(["radiochat-relay", "--port", ":9000"]);
        let settings = resolve_settings(&cli, env_of(&[("PORT", ":7000")])).unwrap();
        assert_eq!(settings.server.listen, ":9000");
    }

    #[test]
    fn invalid_port_flag_is_an_error() {
        let cli = Cli::parse_from(["radiochat-relay", "--port", "nope"]);
        assert!(resolve_settings(&cli, env_of(&[])).is_err());
    }

    #[test]
    fn config_flag_beats_settings_env() {
        let dir = tempfile::tempdir().unwrap();
        let flagged = dir.path().join("flagged.json");
        let from_env = dir.path().join("env.json");
        std::fs::write(&flagged, r#"{"stream": {"publicToken": "from-flag"}}"#).unwrap();
        std::fs::write(&from_env, r#"{"stream": {"publicToken": "from-env"}}"#).unwrap();

        let env_path = from_env.to_string_lossy().into_owned();
        let env = env_of(&[("RADIOCHAT_SETTINGS", env_path.as_str())]);

        let cli = Cli::parse_from(["radiochat-relay"]);
        assert_eq!(
            resolve_settings(&cli, &env).unwrap().stream.public_token,
            "from-env"
        );

        let flagged_arg = flagged.to_string_lossy().into_owned();
        let cli = Cli::parse_from(["radiochat-relay", "--config", flagged_arg.as_str()]);
        assert_eq!(
            resolve_settings(&cli, &env).unwrap().stream.public_token,
            "from-flag"
        );
    }

    #[tokio::test]
    async fn server_graceful_shutdown() {
        let cli = Cli::parse_from(["radiochat-relay", "--port", "127.0.0.1:0"]);
        let settings = resolve_settings(&cli, env_of(&[])).unwrap();
        let server = RadiochatServer::new(settings);
        let (_, handle) = server.listen().await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            server
                .shutdown()
                .graceful_shutdown(vec![handle], Some(Duration::from_secs(2))),
        )
        .await
        .expect("shutdown timed out");
        assert_eq!(outcome, ShutdownOutcome::Drained);
        assert!(server.shutdown().is_shutting_down());
    }
}
