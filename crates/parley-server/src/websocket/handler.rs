//! Command dispatch — decodes an inbound frame and routes it to the
//! register / exit / send handlers, plus the disconnect lifecycle path.

use std::sync::Arc;

use metrics::gauge;
use parley_protocol::{reasons, ClientCommand, FrameError, ServerEvent};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::registry::Roster;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::connection::ClientConnection;

/// Decode one text frame and run the matching handler.
///
/// Every direct reply goes to `conn` only; membership changes and chat
/// messages go through the broadcaster. Nothing here returns an error:
/// precondition failures become error replies, an undecodable frame becomes
/// a decode-error reply, and the connection stays open either way.
#[instrument(skip_all, fields(conn_id = %conn.id))]
pub fn dispatch(conn: &Arc<ClientConnection>, roster: &Roster, broadcaster: &Broadcaster, text: &str) {
    let command = match ClientCommand::parse(text) {
        Ok(c) => c,
        Err(FrameError::UnknownCommand(kind)) => {
            debug!(kind, "unknown command");
            let _ = conn.send_event(&ServerEvent::error(kind, reasons::INVALID_COMMAND));
            return;
        }
        Err(FrameError::Malformed(e)) => {
            debug!(error = %e, "undecodable frame");
            let _ = conn.send_event(&ServerEvent::error("unknown", reasons::INVALID_FRAME));
            return;
        }
    };

    debug!(
        command = command.wire_name(),
        user = conn.user_name().as_deref().unwrap_or(""),
        "frame received"
    );

    match command {
        ClientCommand::Register { name } => on_register(conn, roster, broadcaster, name.as_deref()),
        ClientCommand::Exit => on_exit(conn, roster, broadcaster),
        ClientCommand::Send { data } => on_send(conn, broadcaster, data),
    }
}

/// Transport close/error path: treat the disconnect as an implicit exit.
///
/// Idempotent — the connection's close latch guarantees the registry
/// removal and the membership broadcast run at most once per connection.
/// No reply is sent; the channel is gone.
pub fn on_disconnect(conn: &Arc<ClientConnection>, roster: &Roster, broadcaster: &Broadcaster) {
    if !conn.begin_close() {
        return;
    }
    let Some(name) = conn.user_name() else {
        return;
    };
    if let Some(users) = roster.remove(&name, &conn.id) {
        record_registered(roster);
        let _ = broadcaster.broadcast(&ServerEvent::users(users));
    }
}

fn on_register(
    conn: &Arc<ClientConnection>,
    roster: &Roster,
    broadcaster: &Broadcaster,
    name: Option<&str>,
) {
    match roster.register(name, conn) {
        Ok(admission) => {
            record_registered(roster);
            let _ = conn.send_event(&ServerEvent::register_ok(admission.user.name));
            let _ = broadcaster.broadcast(&ServerEvent::users(admission.users));
        }
        Err(e) => {
            let _ = conn.send_event(&ServerEvent::error("register", e.reason()));
        }
    }
}

fn on_exit(conn: &Arc<ClientConnection>, roster: &Roster, broadcaster: &Broadcaster) {
    let removed = conn
        .user_name()
        .and_then(|name| roster.remove(&name, &conn.id));
    let Some(users) = removed else {
        let _ = conn.send_event(&ServerEvent::error("exit", reasons::NOT_REGISTERED));
        return;
    };
    record_registered(roster);
    let _ = conn.send_event(&ServerEvent::ok("exit"));
    let _ = broadcaster.broadcast(&ServerEvent::users(users));
}

fn on_send(conn: &Arc<ClientConnection>, broadcaster: &Broadcaster, data: Value) {
    let Some(from) = conn.user_name() else {
        let _ = conn.send_event(&ServerEvent::error("send", reasons::NOT_REGISTERED));
        return;
    };
    // The message is relayed to the other registered peers; the sender does
    // not receive an echo.
    let _ = broadcaster.broadcast_except(&ServerEvent::message(from, data), &conn.id);
}

#[allow(clippy::cast_precision_loss)]
fn record_registered(roster: &Roster) {
    gauge!(crate::metrics::RELAY_REGISTERED_USERS).set(roster.len() as f64);
}
