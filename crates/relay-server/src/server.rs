//! Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::{Dispatcher, Relay};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::client::{self, ClientRegistry};
use crate::config::ServerConfig;
use crate::handlers;
use crate::health::{self, HealthResponse};
use crate::metrics::{CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL, DISCONNECTIONS_TOTAL};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Membership and routing state.
    pub relay: Arc<Relay>,
    /// Fan-out over `clients`.
    pub dispatcher: Arc<Dispatcher>,
    /// Connected sockets; the dispatcher's transport.
    pub clients: Arc<ClientRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire fresh relay state to a client registry built from `config`.
    pub fn new(config: ServerConfig, metrics: Option<PrometheusHandle>) -> Self {
        let relay = Arc::new(Relay::new());
        let clients = Arc::new(ClientRegistry::new(
            config.max_send_queue,
            config.client_timeout,
        ));
        let dispatcher = Arc::new(Dispatcher::new(relay.clone(), clients.clone()));
        Self {
            relay,
            dispatcher,
            clients,
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/notify-user", post(handlers::notify_user))
        .route("/notify-vendor", post(handlers::notify_vendor))
        .route(
            "/notify-specific-vendors-in-area",
            post(handlers::notify_vendors_in_area),
        )
        .route("/notify-area", post(handlers::notify_area))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(config, metrics);
    let listener = tokio::net::TcpListener::bind(state.config.bind_addr()).await?;
    let addr = listener.local_addr()?;

    let sweep = client::start_cleanup_task(
        state.clients.clone(),
        state.relay.clone(),
        state.config.heartbeat_interval,
        state.shutdown.token(),
    );

    let shutdown = state.shutdown.clone();
    let relay = state.relay.clone();
    let shutdown_timeout = state.config.shutdown_timeout;
    let token = shutdown.token();
    let router = build_router(state);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            error!(error = %e, "server error");
        }
    });

    info!(%addr, "relay server listening");

    Ok(ServerHandle {
        addr,
        relay,
        shutdown,
        shutdown_timeout,
        tasks: vec![server, sweep],
    })
}

/// Handle returned by [`start`]; keeps the server and its sweep alive.
pub struct ServerHandle {
    addr: SocketAddr,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    shutdown_timeout: std::time::Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Relay state behind the server.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Stop accepting, close open sockets and wait for the server tasks.
    pub async fn shutdown(self) {
        info!("relay server shutting down");
        self.shutdown
            .graceful_shutdown(self.tasks, self.shutdown_timeout)
            .await;
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = state.relay.on_connect();
    let rx = state.clients.register(conn_id.clone());
    counter!(CONNECTIONS_TOTAL).increment(1);
    record_active(&state);
    info!(conn_id = %conn_id, "client connected");

    client::handle_ws_connection(
        socket,
        conn_id.clone(),
        rx,
        state.clients.clone(),
        state.relay.clone(),
        state.config.heartbeat_interval,
        state.shutdown.token(),
    )
    .await;

    let age = state.clients.get(&conn_id).map(|c| c.age());
    let _ = state.clients.unregister(&conn_id);
    let cleaned = state.relay.on_disconnect(&conn_id);
    counter!(DISCONNECTIONS_TOTAL).increment(1);
    record_active(&state);
    info!(
        conn_id = %conn_id,
        age_secs = age.map(|a| a.as_secs()),
        groups = cleaned.as_ref().map_or(0, |c| c.groups.len()),
        "client disconnected"
    );
}

#[allow(clippy::cast_precision_loss)]
fn record_active(state: &AppState) {
    gauge!(CONNECTIONS_ACTIVE).set(state.clients.count() as f64);
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.relay.stats()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_owned()),
    }
}
