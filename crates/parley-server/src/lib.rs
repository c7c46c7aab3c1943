//! # parley-server
//!
//! Axum HTTP + `WebSocket` relay server.
//!
//! - `WebSocket` gateway: one session task per client, heartbeat, command dispatch
//! - Name registry: who is online, one unique display name per open connection
//! - Broadcast engine: best-effort fan-out to every registered client
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;
