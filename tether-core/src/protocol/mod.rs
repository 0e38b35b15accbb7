//! Structured payload definitions for the link's message types.
//!
//! Each sub-module covers one protocol domain. Structured payloads are
//! flat JSON objects (`serde_json`); everything else is UTF-8 or raw bytes
//! carried inside [`Frame`] bodies.
//!
//! [`Frame`]: crate::frame::Frame

pub mod command;
pub mod file;
pub mod notification;
pub mod status;

// Re-export the most commonly used types at the protocol level.
pub use command::{AppEntry, TextCommand};
pub use file::{Artifact, ProgressThrottle, TransferDirection};
pub use notification::{MirrorPolicy, NotificationRecord, SourceNotification};
pub use status::StatusReport;
