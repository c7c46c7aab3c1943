//! WebSocket client connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use parley_protocol::ServerEvent;
use tokio::sync::mpsc;

/// One connected WebSocket client.
///
/// A connection starts anonymous, becomes registered once a name is bound,
/// and is closed after [`ClientConnection::begin_close`] has fired. The
/// registry holds a handle to the connection for delivery; it never owns it.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Bound display name (set on successful register, cleared on exit or
    /// disconnect).
    name: Mutex<Option<String>>,
    /// Send channel to the connection's WebSocket write task.
    tx: mpsc::Sender<String>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded since the last ping.
    pub is_alive: AtomicBool,
    /// When the last pong (or any inbound activity) was seen.
    last_pong: Mutex<Instant>,
    /// One-shot latch so disconnect cleanup runs exactly once.
    closed: AtomicBool,
    /// Count of messages dropped due to a full or closed channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new (anonymous) connection.
    pub fn new(id: String, tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            name: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            closed: AtomicBool::new(false),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Bind a display name to this connection.
    pub fn bind_name(&self, name: String) {
        *self.name.lock() = Some(name);
    }

    /// Clear the bound name (back to anonymous).
    pub fn clear_name(&self) {
        *self.name.lock() = None;
    }

    /// The bound display name, if registered.
    pub fn user_name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    /// Whether this connection currently holds a name.
    pub fn is_registered(&self) -> bool {
        self.name.lock().is_some()
    }

    /// Queue a serialized frame for the write task.
    ///
    /// Returns `false` (and counts the drop) if the channel is full or
    /// closed; the caller never blocks on a slow or dead peer.
    pub fn send(&self, message: String) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize an event and queue it.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(json),
            Err(_) => false,
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong or inbound frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last liveness signal.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Flip the closed latch. Returns `true` exactly once; disconnect
    /// cleanup is gated on this so double-invocation is a no-op.
    pub fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Whether close has begun.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
