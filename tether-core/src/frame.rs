//! The atomic wire unit: a typed, length-delimited frame.
//!
//! ```text
//! ┌──────────┬───────────────┬──────────────────────┐
//! │ type: u8 │ length: u32BE │ payload: [u8; length] │
//! └──────────┴───────────────┴──────────────────────┘
//! ```

use std::fmt::{self, Debug};

use bytes::Bytes;

use crate::error::TetherError;
use crate::message::MessageType;

/// Size of the fixed frame header (type byte + length).
pub const HEADER_SIZE: usize = 5;

/// Largest payload accepted on either side of the link.
pub const MAX_PAYLOAD_SIZE: usize = 10_000_000;

/// Payload carried by heartbeat frames.
pub const HEARTBEAT_PAYLOAD: &[u8] = b"PING";

/// A single decoded or to-be-encoded frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    kind: MessageType,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, rejecting payloads above [`MAX_PAYLOAD_SIZE`].
    pub fn new(kind: MessageType, payload: impl Into<Bytes>) -> Result<Self, TetherError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TetherError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { kind, payload })
    }

    /// A frame with no payload.
    pub fn empty(kind: MessageType) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            kind: MessageType::Heartbeat,
            payload: Bytes::from_static(HEARTBEAT_PAYLOAD),
        }
    }

    /// A frame carrying a UTF-8 string.
    pub fn text(kind: MessageType, text: impl Into<String>) -> Result<Self, TetherError> {
        Self::new(kind, text.into().into_bytes())
    }

    /// `FileStart` with the total size, `-1` when unknown.
    pub fn file_start(size: i64) -> Self {
        Self {
            kind: MessageType::FileStart,
            payload: Bytes::copy_from_slice(&size.to_be_bytes()),
        }
    }

    pub fn file_end() -> Self {
        Self::empty(MessageType::FileEnd)
    }

    pub fn shutdown() -> Self {
        Self::empty(MessageType::ShutdownCommand)
    }

    pub fn set_dnd(enable: bool) -> Self {
        let text: &'static [u8] = if enable { b"true" } else { b"false" };
        Self {
            kind: MessageType::SetDnd,
            payload: Bytes::from_static(text),
        }
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Interpret the payload as UTF-8.
    pub fn payload_str(&self) -> Result<&str, TetherError> {
        std::str::from_utf8(&self.payload).map_err(|e| TetherError::MalformedPayload {
            kind: "utf-8",
            reason: e.to_string(),
        })
    }

    /// Decode the size carried by a `FileStart` frame.
    pub fn file_start_size(&self) -> Result<i64, TetherError> {
        if self.kind != MessageType::FileStart {
            return Err(TetherError::ProtocolViolation("not a FileStart frame"));
        }
        let bytes: [u8; 8] =
            self.payload
                .as_ref()
                .try_into()
                .map_err(|_| TetherError::MalformedPayload {
                    kind: "FileStart",
                    reason: format!("expected 8 bytes, got {}", self.payload.len()),
                })?;
        Ok(i64::from_be_bytes(bytes))
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
