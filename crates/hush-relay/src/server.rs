//! WebSocket relay server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use hush_proto::split_frames;

use crate::config::RelayConfig;
use crate::hub::{ClientId, Hub, HubHandle};
use crate::mailbox::{mailbox, run_writer, FrameSink, WriterError};
use crate::metrics::RelayMetrics;

/// Shared state for the WebSocket route
#[derive(Clone)]
struct AppState {
    hub: HubHandle,
    mailbox_capacity: usize,
    max_message_size: usize,
}

/// Shared state for the admin routes
#[derive(Clone)]
struct AdminState {
    hub: HubHandle,
    metrics: Arc<RelayMetrics>,
}

/// Relay server bound to its listen address
pub struct RelayServer {
    config: RelayConfig,
    hub: HubHandle,
    metrics: Arc<RelayMetrics>,
    listener: TcpListener,
    admin_listener: Option<TcpListener>,
}

impl RelayServer {
    /// Validate config, start the hub and bind listeners.
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate().context("Invalid relay configuration")?;

        let metrics = Arc::new(RelayMetrics::new().context("Failed to create metrics")?);
        let hub = Hub::spawn(metrics.clone());

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        let admin_listener = match config.admin_addr {
            Some(addr) => Some(
                TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("Failed to bind admin address {}", addr))?,
            ),
            None => None,
        };

        Ok(Self {
            config,
            hub,
            metrics,
            listener,
            admin_listener,
        })
    }

    /// Address clients connect to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Address of the admin listener, if enabled
    pub fn admin_addr(&self) -> Option<SocketAddr> {
        self.admin_listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.metrics.clone()
    }

    /// Router serving the WebSocket upgrade path
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            mailbox_capacity: self.config.mailbox_capacity,
            max_message_size: self.config.max_message_size,
        };
        Router::new()
            .route(&self.config.ws_path, get(ws_handler))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Router serving health, readiness and metrics
    pub fn admin_router(&self) -> Router {
        let state = AdminState {
            hub: self.hub.clone(),
            metrics: self.metrics.clone(),
        };
        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let router = self.router();
        let admin_router = self.admin_router();

        if let Some(admin_listener) = self.admin_listener {
            info!("Admin endpoints listening on {}", admin_listener.local_addr()?);
            tokio::spawn(async move {
                if let Err(e) = axum::serve(admin_listener, admin_router).await {
                    error!("Admin server error: {}", e);
                }
            });
        }

        info!(
            "Relay listening on ws://{}{}",
            self.listener.local_addr()?,
            self.config.ws_path
        );
        axum::serve(self.listener, router)
            .await
            .context("Relay server failed")
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| serve_connection(socket, state))
}

/// Writer half of an upgraded socket
struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), WriterError> {
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| WriterError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), WriterError> {
        self.0
            .close()
            .await
            .map_err(|e| WriterError::Transport(e.to_string()))
    }
}

/// Drive one client: register, spawn its writer, forward inbound frames
/// to the hub until the transport ends, then unregister.
async fn serve_connection(socket: WebSocket, state: AppState) {
    let id = ClientId::generate();
    let (sink, mut stream) = socket.split();
    let (mailbox, receiver) = mailbox(state.mailbox_capacity);

    if state.hub.register(id.clone(), mailbox).await.is_err() {
        error!(client = %id, "Hub is gone, dropping connection");
        return;
    }

    let writer_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = run_writer(receiver, WsSink(sink)).await {
            debug!(client = %writer_id, "Writer stopped: {}", e);
        }
    });

    'read: while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(client = %id, "Read error: {}", e);
                break;
            }
        };

        for frame in split_frames(&text) {
            if state.hub.broadcast(frame.to_string()).await.is_err() {
                break 'read;
            }
        }
    }

    debug!(client = %id, "Connection closed");
    let _ = state.hub.unregister(id).await;
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 while the hub dispatch loop answers, 503 otherwise
async fn ready_handler(State(state): State<AdminState>) -> StatusCode {
    match state.hub.live_ids().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics_handler(State(state): State<AdminState>) -> Result<Response<String>, StatusCode> {
    match state.metrics.export() {
        Ok(body) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain; version=0.0.4")
            .body(body)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
