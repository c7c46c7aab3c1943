//! `RelayServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::registry::Roster;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::session::{run_session, SessionConfig};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Online-presence registry.
    pub roster: Arc<Roster>,
    /// Broadcast engine over the roster.
    pub broadcaster: Broadcaster,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Live connection count (registered + anonymous).
    pub connections: Arc<AtomicUsize>,
    /// Per-session tuning derived from the config.
    pub session: SessionConfig,
    /// Prometheus render handle, when metrics are installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server: owns the registry, the broadcast engine, and the
/// transport the core runs on top of.
pub struct RelayServer {
    config: ServerConfig,
    roster: Arc<Roster>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    connections: Arc<AtomicUsize>,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            roster: Arc::new(Roster::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            connections: Arc::new(AtomicUsize::new(0)),
            metrics: None,
        }
    }

    /// Attach an installed Prometheus recorder for the `/metrics` endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            roster: Arc::clone(&self.roster),
            broadcaster: Broadcaster::new(Arc::clone(&self.roster)),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            connections: Arc::clone(&self.connections),
            session: SessionConfig::from(&self.config),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Resolves to the bound address (useful with port `0`) and the serve
    /// task's join handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server task exited with error");
            }
        });
        Ok((addr, handle))
    }

    /// Get the registry.
    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws — WebSocket upgrade; each accepted socket runs its own session.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let conn_id = format!("conn_{}", Uuid::now_v7().simple());
    ws.max_message_size(state.session.max_message_size)
        .on_upgrade(move |socket| run_session(socket, conn_id, state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.connections.load(Ordering::Relaxed);
    let registered = state.roster.len();
    Json(health::health_check(state.start_time, connections, registered))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
