//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `8000`, `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound channel capacity. A recipient whose channel
    /// is full has further frames dropped rather than stalling the sender.
    pub send_buffer: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (disconnect after this long without a pong).
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            max_message_size: 64 * 1024,
            send_buffer: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl ServerConfig {
    /// Defaults with environment variable overrides applied.
    ///
    /// Each variable has strict parsing rules; invalid or out-of-range
    /// values are silently ignored (fall back to the default).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = read_env("PARLEY_HOST") {
            cfg.host = v;
        }
        if let Some(v) = read_env("PARLEY_PORT").and_then(|v| parse_u16(&v)) {
            cfg.port = v;
        }
        if let Some(v) =
            read_env("PARLEY_MAX_MESSAGE_SIZE").and_then(|v| parse_usize(&v, 1024, 16 * 1024 * 1024))
        {
            cfg.max_message_size = v;
        }
        if let Some(v) = read_env("PARLEY_SEND_BUFFER").and_then(|v| parse_usize(&v, 1, 65_536)) {
            cfg.send_buffer = v;
        }
        if let Some(v) =
            read_env("PARLEY_HEARTBEAT_INTERVAL_SECS").and_then(|v| parse_u64(&v, 1, 3_600))
        {
            cfg.heartbeat_interval_secs = v;
        }
        if let Some(v) =
            read_env("PARLEY_HEARTBEAT_TIMEOUT_SECS").and_then(|v| parse_u64(&v, 1, 86_400))
        {
            cfg.heartbeat_timeout_secs = v;
        }
        cfg
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_u16(value: &str) -> Option<u16> {
    value.trim().parse().ok()
}

fn parse_u64(value: &str, min: u64, max: u64) -> Option<u64> {
    value.trim().parse().ok().filter(|v| (min..=max).contains(v))
}

fn parse_usize(value: &str, min: usize, max: usize) -> Option<usize> {
    value.trim().parse().ok().filter(|v| (min..=max).contains(v))
}
