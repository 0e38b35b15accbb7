//! Wire message types.
//!
//! Unknown type bytes are rejected through `TryFrom`.

use crate::error::TetherError;
use std::fmt;

// ── MessageType ──────────────────────────────────────────────────

/// Every frame type understood by the link.
///
/// The discriminants are the on-wire type byte and must stay stable on
/// both ends. Value `2` is unassigned.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// UTF-8 request/response strings (app list exchange).
    TextCommand = 1,
    /// JSON notification record to mirror on the peer.
    NotificationPosted = 3,
    /// Liveness probe.
    Heartbeat = 4,
    /// Key of a notification removed at its origin.
    NotificationRemoved = 5,
    /// Key of a mirrored notification dismissed on the peer.
    RequestDismiss = 6,
    /// Start of a file transfer; payload is an 8-byte signed size.
    FileStart = 7,
    /// Raw file bytes.
    FileChunk = 8,
    /// End of a file transfer; empty payload.
    FileEnd = 9,
    /// Remote power-off; empty payload, never acknowledged.
    ShutdownCommand = 10,
    /// JSON device telemetry.
    StatusUpdate = 11,
    /// ASCII `true`/`false` do-not-disturb command.
    SetDnd = 12,
}

impl MessageType {
    /// All message types in wire order.
    pub const ALL: [MessageType; 11] = [
        MessageType::TextCommand,
        MessageType::NotificationPosted,
        MessageType::Heartbeat,
        MessageType::NotificationRemoved,
        MessageType::RequestDismiss,
        MessageType::FileStart,
        MessageType::FileChunk,
        MessageType::FileEnd,
        MessageType::ShutdownCommand,
        MessageType::StatusUpdate,
        MessageType::SetDnd,
    ];

    /// Returns `true` for frames whose payload must be empty.
    pub fn is_empty_payload(&self) -> bool {
        matches!(self, MessageType::FileEnd | MessageType::ShutdownCommand)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = TetherError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::TextCommand),
            3 => Ok(MessageType::NotificationPosted),
            4 => Ok(MessageType::Heartbeat),
            5 => Ok(MessageType::NotificationRemoved),
            6 => Ok(MessageType::RequestDismiss),
            7 => Ok(MessageType::FileStart),
            8 => Ok(MessageType::FileChunk),
            9 => Ok(MessageType::FileEnd),
            10 => Ok(MessageType::ShutdownCommand),
            11 => Ok(MessageType::StatusUpdate),
            12 => Ok(MessageType::SetDnd),
            _ => Err(TetherError::UnknownVariant {
                type_name: "MessageType",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        for kind in MessageType::ALL {
            assert_eq!(MessageType::try_from(kind as u8).unwrap(), kind);
        }
    }

    #[test]
    fn message_type_invalid() {
        assert!(MessageType::try_from(0).is_err());
        assert!(MessageType::try_from(2).is_err());
        assert!(MessageType::try_from(0xFF).is_err());
    }

    #[test]
    fn empty_payload_types() {
        assert!(MessageType::ShutdownCommand.is_empty_payload());
        assert!(MessageType::FileEnd.is_empty_payload());
        assert!(!MessageType::Heartbeat.is_empty_payload());
        assert!(!MessageType::SetDnd.is_empty_payload());
    }
}
