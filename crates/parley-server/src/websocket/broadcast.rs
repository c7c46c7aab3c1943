//! Event fan-out to registered clients.

use std::sync::Arc;

use metrics::counter;
use parley_protocol::ServerEvent;
use tracing::{debug, warn};

use crate::registry::Roster;

/// Best-effort broadcast engine over the roster.
///
/// Serializes an event once and pushes it independently to every registered
/// connection via its non-blocking send channel. A recipient whose channel
/// is closed or full is skipped; one slow or dead peer never stalls
/// delivery to the rest. Anonymous connections are structurally excluded —
/// they are not roster members.
#[derive(Clone)]
pub struct Broadcaster {
    roster: Arc<Roster>,
}

impl Broadcaster {
    /// Create a broadcaster over the given roster.
    pub fn new(roster: Arc<Roster>) -> Self {
        Self { roster }
    }

    /// Deliver `event` to every registered, open connection.
    ///
    /// Returns the number of recipients the event was queued for.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.fan_out(event, None)
    }

    /// Deliver `event` to every registered, open connection except the one
    /// with id `skip` (used for chat messages, which are not echoed back to
    /// their sender).
    pub fn broadcast_except(&self, event: &ServerEvent, skip: &str) -> usize {
        self.fan_out(event, Some(skip))
    }

    fn fan_out(&self, event: &ServerEvent, skip: Option<&str>) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast event");
                return 0;
            }
        };

        // Snapshot before iterating: registration or removal during fan-out
        // must neither break the loop nor deliver to a half-removed entry.
        let members = self.roster.members();
        let mut delivered = 0;
        for conn in &members {
            if skip.is_some_and(|id| id == conn.id) {
                continue;
            }
            if conn.send(json.clone()) {
                delivered += 1;
            } else {
                counter!(crate::metrics::WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, "dropped broadcast to client (channel closed or full)");
            }
        }
        debug!(recipients = members.len(), delivered, "broadcast event");
        delivered
    }
}
