//! Engine timing and transfer configuration.
//!
//! Durations are stored as milliseconds so the struct embeds cleanly in the
//! binaries' TOML files; use the accessor methods to get `Duration`s.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::frame::MAX_PAYLOAD_SIZE;
use crate::protocol::notification::MirrorPolicy;

/// Configuration for [`LinkEngine`](crate::engine::LinkEngine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Interval between liveness checks / heartbeat frames.
    pub heartbeat_interval_ms: u64,
    /// Silence after which the link is declared dead. Also bounds how long
    /// a single frame write may block.
    pub liveness_timeout_ms: u64,
    /// Skip heartbeats and liveness checks while a transfer is active.
    pub suspend_liveness_during_transfer: bool,
    /// Wait before redialing after an established session was lost.
    pub reconnect_delay_ms: u64,
    /// Wait before redialing after a failed connect attempt.
    pub connect_retry_delay_ms: u64,
    /// Wait before reopening a listener that failed to open.
    pub listen_retry_delay_ms: u64,
    /// Bound on a single accept poll so the accept loop stays cancellable.
    pub accept_poll_ms: u64,
    /// Bytes per `FileChunk` frame.
    pub chunk_size: usize,
    /// Minimum spacing between progress callbacks.
    pub progress_interval_ms: u64,
    /// Delay between applying a DND command and reporting fresh status.
    pub dnd_status_delay_ms: u64,
    /// Bound on the privileged shutdown collaborator call.
    pub shutdown_timeout_ms: u64,
    /// Responder-side status telemetry interval while connected (0 = disabled).
    pub status_interval_ms: u64,
    /// Directory that receives inbound artifacts.
    pub artifact_dir: PathBuf,
    /// Conventional file name of the inbound artifact; replaced per transfer.
    pub artifact_name: String,
    /// Which outbound notifications are mirrored to the peer.
    pub mirroring: MirrorPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 20_000,
            liveness_timeout_ms: 60_000,
            suspend_liveness_during_transfer: true,
            reconnect_delay_ms: 3_000,
            connect_retry_delay_ms: 5_000,
            listen_retry_delay_ms: 3_000,
            accept_poll_ms: 5_000,
            chunk_size: 8 * 1024,
            progress_interval_ms: 300,
            dnd_status_delay_ms: 500,
            shutdown_timeout_ms: 3_000,
            status_interval_ms: 5_000,
            artifact_dir: std::env::temp_dir(),
            artifact_name: "incoming.pkg".into(),
            mirroring: MirrorPolicy::default(),
        }
    }
}

impl LinkConfig {
    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(TetherError::InvalidConfig(
                "heartbeat_interval_ms must be non-zero".into(),
            ));
        }
        if self.liveness_timeout_ms < self.heartbeat_interval_ms.saturating_mul(2) {
            return Err(TetherError::InvalidConfig(format!(
                "liveness_timeout_ms ({}) must be at least twice heartbeat_interval_ms ({})",
                self.liveness_timeout_ms, self.heartbeat_interval_ms
            )));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_PAYLOAD_SIZE {
            return Err(TetherError::InvalidConfig(format!(
                "chunk_size must be in 1..={MAX_PAYLOAD_SIZE}"
            )));
        }
        if self.accept_poll_ms == 0 {
            return Err(TetherError::InvalidConfig(
                "accept_poll_ms must be non-zero".into(),
            ));
        }
        if self.artifact_name.is_empty() {
            return Err(TetherError::InvalidConfig(
                "artifact_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    pub fn listen_retry_delay(&self) -> Duration {
        Duration::from_millis(self.listen_retry_delay_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn dnd_status_delay(&self) -> Duration {
        Duration::from_millis(self.dnd_status_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `None` when periodic telemetry is disabled.
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_ms > 0).then(|| Duration::from_millis(self.status_interval_ms))
    }

    /// Full path of the inbound artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.artifact_name)
    }
}
