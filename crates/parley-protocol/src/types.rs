//! Inbound frame parsing and outbound event construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Public user record. The display name is the full identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Unique display name.
    pub name: String,
}

impl UserInfo {
    /// Build a record from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raw inbound envelope.
///
/// Parsed first so the original `type` string survives for error replies
/// even when the command is unknown. Extra fields (a client-supplied
/// `created`, say) are dropped here and never trusted.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: Option<UserRef>,
    #[serde(default)]
    data: Option<Value>,
}

/// The `user` object carried by a register frame.
#[derive(Debug, Deserialize)]
struct UserRef {
    #[serde(default)]
    name: Option<String>,
}

/// A decoded client command.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientCommand {
    /// Claim a display name.
    ///
    /// `name` is `None` when the frame carried no usable (non-empty) name;
    /// the handler answers with the empty-name reason.
    Register {
        /// Requested display name.
        name: Option<String>,
    },
    /// Release the bound name.
    Exit,
    /// Relay a payload to the other registered peers.
    Send {
        /// Opaque payload, forwarded untouched (`null` when absent).
        data: Value,
    },
}

/// Why an inbound frame could not be decoded into a [`ClientCommand`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body was not a JSON object with a string `type`.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The `type` field named no known command.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
}

impl ClientCommand {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        match raw.kind.as_str() {
            "register" => Ok(Self::Register {
                name: raw
                    .user
                    .and_then(|u| u.name)
                    .filter(|n| !n.is_empty()),
            }),
            "exit" => Ok(Self::Exit),
            "send" => Ok(Self::Send {
                data: raw.data.unwrap_or(Value::Null),
            }),
            other => Err(FrameError::UnknownCommand(other.to_string())),
        }
    }

    /// The wire name of this command, echoed in replies.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Exit => "exit",
            Self::Send { .. } => "send",
        }
    }
}

/// An outbound server event, serialized once per broadcast and pushed to
/// each recipient independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Direct success reply to the originating connection.
    Ok {
        /// Echo of the command that succeeded.
        command: String,
        /// Registered name (present on register-ok only).
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
    /// Direct error reply to the originating connection.
    Error {
        /// Echo of the command (or `"unknown"` for undecodable frames).
        command: String,
        /// Wire reason, one of [`crate::reasons`].
        reason: String,
    },
    /// Membership changed; the full roster in registration order.
    Users {
        /// Everyone currently registered.
        users: Vec<UserInfo>,
    },
    /// A relayed chat message.
    Message {
        /// The sender's bound name.
        from: String,
        /// Opaque payload as sent.
        data: Value,
        /// Server-side ISO-8601 UTC creation timestamp.
        created: String,
    },
}

impl ServerEvent {
    /// Success reply without a payload (`exit`).
    pub fn ok(command: impl Into<String>) -> Self {
        Self::Ok {
            command: command.into(),
            user: None,
        }
    }

    /// Success reply for `register`, carrying the claimed name.
    pub fn register_ok(name: impl Into<String>) -> Self {
        Self::Ok {
            command: "register".into(),
            user: Some(name.into()),
        }
    }

    /// Error reply.
    pub fn error(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Error {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Membership broadcast.
    pub fn users(users: Vec<UserInfo>) -> Self {
        Self::Users { users }
    }

    /// Chat-message broadcast, stamped with the current UTC time.
    ///
    /// The timestamp always comes from the server clock; anything the
    /// client sent is discarded during frame parsing.
    pub fn message(from: impl Into<String>, data: Value) -> Self {
        Self::Message {
            from: from.into(),
            data,
            created: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}
