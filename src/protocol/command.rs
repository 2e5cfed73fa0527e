//! Command packet recognition.
//!
//! A real device accepts many control operations; only start and stop
//! streaming are modeled here. Identity is decided by the first
//! [`COMMAND_PREFIX_LEN`] bytes. Anything after the prefix (sequence number,
//! checksum) is not validated at this layer.

use super::constants::{CMD_DATA_START, CMD_DATA_STOP, COMMAND_PREFIX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    /// Not a command this layer knows. Callers ignore it.
    Unknown,
}

/// Classify a datagram by its leading bytes.
pub fn match_command(data: &[u8]) -> CommandKind {
    match data.get(..COMMAND_PREFIX_LEN) {
        Some(prefix) if prefix == CMD_DATA_START => CommandKind::Start,
        Some(prefix) if prefix == CMD_DATA_STOP => CommandKind::Stop,
        _ => CommandKind::Unknown,
    }
}

/// The bytes to send for a command, or `None` for [`CommandKind::Unknown`].
pub fn encode_command(kind: CommandKind) -> Option<[u8; COMMAND_PREFIX_LEN]> {
    match kind {
        CommandKind::Start => Some(CMD_DATA_START),
        CommandKind::Stop => Some(CMD_DATA_STOP),
        CommandKind::Unknown => None,
    }
}
