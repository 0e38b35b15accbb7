//! Connection state machine shared by both roles.
//!
//! Provides a `ConnectionPhase` enum that models the full lifecycle of the
//! link, with validated transitions that return `Result` instead of
//! panicking.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::TetherError;

// ── Role ─────────────────────────────────────────────────────────

/// Which side of the pairing this engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dials a remembered or discovered peer (the hub).
    Initiator,
    /// Listens for the peer to dial in (the satellite).
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => write!(f, "initiator"),
            Self::Responder => write!(f, "responder"),
        }
    }
}

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of the link.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected ──► Reconnecting
///       ▲               │  ▲                          │
///       │               │  └──────────────────────────┘
///       └───────────────┘ (no peer found)
///
///  any ──► Stopped   (explicit request only; never retries)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No link and nothing scheduled.
    #[default]
    Disconnected,

    /// Dialing, scanning or listening.
    Connecting,

    /// Stream established; frames flowing.
    Connected {
        /// When the link entered the `Connected` state.
        since: Instant,
    },

    /// Link lost or dial failed; a retry is scheduled.
    Reconnecting,

    /// Stopped on request. Terminal until explicitly restarted.
    Stopped,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// How long the link has been up; `None` in any other phase.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`, `Reconnecting`, `Connecting` (no-op).
    pub fn begin_connect(&mut self) -> Result<(), TetherError> {
        match self {
            Self::Disconnected | Self::Reconnecting | Self::Connecting => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(TetherError::ProtocolViolation(
                "cannot connect: link is connected or stopped",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), TetherError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(TetherError::ProtocolViolation(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// A dial or listen attempt failed; a retry will follow.
    ///
    /// Valid from: `Connecting`, `Reconnecting` (no-op).
    pub fn connect_failed(&mut self) -> Result<(), TetherError> {
        match self {
            Self::Connecting | Self::Reconnecting => {
                *self = Self::Reconnecting;
                Ok(())
            }
            _ => Err(TetherError::ProtocolViolation(
                "cannot fail connect: not connecting",
            )),
        }
    }

    /// The established link went away; a retry will follow.
    ///
    /// Valid from: `Connected`.
    pub fn connection_lost(&mut self) -> Result<(), TetherError> {
        match self {
            Self::Connected { .. } => {
                *self = Self::Reconnecting;
                Ok(())
            }
            _ => Err(TetherError::ProtocolViolation(
                "cannot lose connection: not connected",
            )),
        }
    }

    /// Give up without retrying (no peer found, disambiguation needed).
    ///
    /// Valid from: `Connecting`, `Reconnecting`, `Disconnected` (no-op).
    pub fn give_up(&mut self) -> Result<(), TetherError> {
        match self {
            Self::Connecting | Self::Reconnecting | Self::Disconnected => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(TetherError::ProtocolViolation(
                "cannot give up: link is connected or stopped",
            )),
        }
    }

    /// Leave `Stopped` so a fresh lifecycle can start.
    pub fn restart(&mut self) {
        if self.is_stopped() {
            *self = Self::Disconnected;
        }
    }

    /// Force `Stopped` regardless of the current phase.
    pub fn stop(&mut self) {
        *self = Self::Stopped;
    }
}

// ── Tests ────────────────────────────────────────────────────────
