//! # parley-protocol
//!
//! Wire-format types for the parley relay: inbound command frames,
//! outbound server events, and the error reasons used on the wire.

#![deny(unsafe_code)]

pub mod reasons;
pub mod types;

pub use types::{ClientCommand, FrameError, ServerEvent, UserInfo};
