//! `RadiochatServer`: Axum HTTP + WebSocket relay server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use radiochat_settings::{RadiochatSettings, SettingsError, StreamSettings};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::api;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::protocol::{InvalidRole, Role};
use crate::websocket::registry::Registry;
use crate::websocket::session::{SessionContext, run_session};

/// Errors starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be derived from settings.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay session context (registry, dispatcher, verifier).
    pub sessions: Arc<SessionContext>,
    /// External stream metadata.
    pub stream: Arc<StreamSettings>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RadiochatServer {
    settings: RadiochatSettings,
    registry: Arc<Registry>,
    sessions: Arc<SessionContext>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RadiochatServer {
    /// Create a server from validated settings.
    pub fn new(settings: RadiochatSettings) -> Self {
        let registry = Arc::new(Registry::new());
        let sessions = Arc::new(SessionContext::new(&settings, registry.clone()));
        Self {
            settings,
            registry,
            sessions,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            sessions: self.sessions.clone(),
            stream: Arc::new(self.settings.stream.clone()),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/v1/health", get(health_handler))
            .route("/api/v1/token", get(api::token_handler))
            .route("/api/v1/radio", get(api::radio_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the serving task. Settings are checked
    /// again here since their fields are public.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        self.settings.validate()?;
        let addr = self.settings.server.bind_address()?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "radiochat relay listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            match result {
                Ok(()) => debug!("http server stopped"),
                Err(error) => error!(%error, "http server stopped with error"),
            }
        });

        Ok((local_addr, handle))
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Settings in effect.
    pub fn settings(&self) -> &RadiochatSettings {
        &self.settings
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WsParams {
    role: String,
}

/// GET /ws?role=user|radio
///
/// The role is checked before the upgrade so a bad request never allocates
/// a session.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let role: Role = match params.role.parse() {
        Ok(role) => role,
        Err(InvalidRole) => {
            return (StatusCode::BAD_REQUEST, InvalidRole.to_string()).into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let sessions = state.sessions.clone();
    let coordinator = state.shutdown.clone();
    ws.max_message_size(sessions.timing().max_message_size)
        .on_upgrade(move |socket| {
            let shutdown = coordinator.token();
            coordinator.track_session(run_session(socket, role, sessions, shutdown))
        })
}

/// GET /api/v1/health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.sessions.registry();
    Json(health::health_check(
        state.start_time,
        registry.user_count(),
        registry.radio_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
