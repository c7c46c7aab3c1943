//! Error reasons sent verbatim on the wire in `error` replies.

/// Register on a connection that already holds a name.
pub const ALREADY_REGISTERED: &str = "Already registered";
/// Register with a missing or empty name.
pub const NAME_EMPTY: &str = "Name cannot be empty";
/// Register with a name another connection holds.
pub const NAME_TAKEN: &str = "Name already exists";
/// Exit or send from an anonymous connection.
pub const NOT_REGISTERED: &str = "Not registered";
/// Frame with an unrecognized `type`.
pub const INVALID_COMMAND: &str = "Invalid command";
/// Frame body that could not be decoded at all.
pub const INVALID_FRAME: &str = "Invalid frame";
