//! Domain-specific error types for the tether link.
//!
//! All fallible operations return `Result<T, TetherError>`.
//! Invalid input never panics. Every failure is a typed, recoverable error.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the tether link engine.
#[derive(Debug, Error)]
pub enum TetherError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A frame or transition violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A frame payload did not have the shape its type requires.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },

    // ── Frame Errors ─────────────────────────────────────────────
    /// The declared or actual payload length exceeds the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("truncated frame: {buffered} bytes buffered at end of stream")]
    TruncatedFrame { buffered: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The stream/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation needs a live connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// A frame could not be written within the liveness window.
    #[error("write stalled for {0:?}")]
    WriteStalled(Duration),

    // ── Transfer Errors ──────────────────────────────────────────
    /// A file transfer is already running on this connection.
    #[error("a file transfer is already in progress")]
    TransferInProgress,

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a structured payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Application Errors ───────────────────────────────────────
    /// Configuration values are inconsistent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A collaborator (presenter, power control, artifact handler, …) failed.
    #[error("{collaborator} failed: {reason}")]
    Collaborator {
        collaborator: &'static str,
        reason: String,
    },

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl TetherError {
    /// Returns `true` for failures that end the current connection
    /// (transport and framing errors). Everything else is handled locally.
    pub fn is_fatal_to_link(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::FrameTooLarge { .. }
                | Self::TruncatedFrame { .. }
                | Self::UnknownVariant { .. }
                | Self::NotConnected
                | Self::WriteStalled(_)
        )
    }

    /// Shorthand for a [`TetherError::Collaborator`] error.
    pub fn collaborator(collaborator: &'static str, reason: impl ToString) -> Self {
        Self::Collaborator {
            collaborator,
            reason: reason.to_string(),
        }
    }
}

// ── TaskError ─────────────────────────────────────────────────────

/// Typed error for deadline-bound collaborator calls.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task exceeded its deadline and was cancelled.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for TetherError {
    fn from(s: String) -> Self {
        TetherError::Other(s)
    }
}

impl From<&str> for TetherError {
    fn from(s: &str) -> Self {
        TetherError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(e: serde_json::Error) -> Self {
        TetherError::Encoding(e.to_string())
    }
}
