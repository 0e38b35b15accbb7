//! Mutable per-engine link state.
//!
//! Guarded by a plain `std::sync::Mutex` inside the engine. Never hold the
//! lock across an `.await`.

use std::time::Duration;

use tokio::time::Instant;

use super::connection::{ConnectionPhase, Role};

/// Snapshot of everything the engine knows about the current link.
#[derive(Debug, Clone)]
pub struct LinkState {
    pub role: Role,
    pub phase: ConnectionPhase,
    /// Human-readable status last reported to the observer.
    pub status: String,
    /// Display name of the connected peer, if any.
    pub peer_name: Option<String>,
    /// Last time any frame was received or a chunk was sent.
    pub last_activity: Instant,
    /// An outbound file transfer holds the write side.
    pub transferring: bool,
    /// Arrival time of the most recent inbound `FileChunk` while a receive
    /// session is open.
    pub last_chunk_at: Option<Instant>,
    /// Incremented every time a new session is established.
    pub session: u64,
}

impl LinkState {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            phase: ConnectionPhase::Disconnected,
            status: "Idle".into(),
            peer_name: None,
            last_activity: Instant::now(),
            transferring: false,
            last_chunk_at: None,
            session: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last frame was seen.
    pub fn silence(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Whether a transfer in either direction is in flight. An inbound
    /// session only counts while chunks keep arriving within `stale_after`.
    pub fn transfer_active(&self, stale_after: Duration) -> bool {
        self.transferring
            || self
                .last_chunk_at
                .is_some_and(|at| at.elapsed() <= stale_after)
    }
}
