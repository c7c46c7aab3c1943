//! WebSocket session lifecycle — one task per client, from upgrade through
//! disconnect.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::server::AppState;
use crate::websocket::connection::ClientConnection;
use crate::websocket::handler::{dispatch, on_disconnect};

/// Per-session tuning derived from `ServerConfig`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound channel capacity.
    pub send_buffer: usize,
    /// Interval between server-initiated Ping frames.
    pub ping_interval: Duration,
    /// How long to wait for a pong before considering the client dead.
    pub pong_timeout: Duration,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Spawns an outbound forwarder that drains the connection's send
///    channel and emits periodic Ping frames
/// 2. Dispatches inbound text frames; binary frames are dropped (the
///    protocol is text-only)
/// 3. Disconnects clients that stop answering pings
/// 4. Runs the disconnect cleanup exactly once on the way out
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_session(ws: WebSocket, conn_id: String, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<String>(state.session.send_buffer);
    let connection = Arc::new(ClientConnection::new(conn_id, send_tx));

    let connection_start = std::time::Instant::now();
    info!("client connected");
    counter!(crate::metrics::WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(crate::metrics::WS_CONNECTIONS_ACTIVE).increment(1.0);
    let _ = state.connections.fetch_add(1, Ordering::Relaxed);

    // Outbound forwarder with periodic Ping frames.
    let ping_interval = state.session.ping_interval;
    let pong_timeout = state.session.pong_timeout;
    let outbound_conn = Arc::clone(&connection);
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(conn_id = %outbound_conn.id, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        // Closing the sink lets the read half observe the disconnect.
        let _ = ws_tx.close().await;
    });

    // Process inbound frames
    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => {
                connection.mark_alive();
                dispatch(&connection, &state.roster, &state.broadcaster, text.as_str());
            }
            Message::Binary(data) => {
                // Text-protocol-only boundary: binary frames are ignored.
                debug!(len = data.len(), "binary frame dropped");
            }
            Message::Ping(_) | Message::Pong(_) => connection.mark_alive(),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
        }
    }

    info!(dropped = connection.drop_count(), "client disconnected");
    on_disconnect(&connection, &state.roster, &state.broadcaster);
    counter!(crate::metrics::WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(crate::metrics::WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(crate::metrics::WS_CONNECTION_DURATION_SECONDS)
        .record(connection_start.elapsed().as_secs_f64());
    let _ = state.connections.fetch_sub(1, Ordering::Relaxed);
    outbound.abort();
}

impl From<&crate::config::ServerConfig> for SessionConfig {
    fn from(cfg: &crate::config::ServerConfig) -> Self {
        Self {
            max_message_size: cfg.max_message_size,
            send_buffer: cfg.send_buffer,
            ping_interval: Duration::from_secs(cfg.heartbeat_interval_secs),
            pong_timeout: Duration::from_secs(cfg.heartbeat_timeout_secs),
        }
    }
}
