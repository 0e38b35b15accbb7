//! File transfer sub-protocol: chunk progress and received artifacts.
//!
//! # Wire Protocol
//!
//! ```text
//! Sender ──[FileStart]──────► Receiver   (once)
//!   Payload: i64 big-endian total size, -1 when unknown
//!
//! Sender ──[FileChunk]──────► Receiver   (repeated)
//!   Payload: raw bytes, at most `chunk_size`
//!
//! Sender ──[FileEnd]────────► Receiver   (once)
//!   Payload: empty
//! ```
//!
//! There is no acknowledgement and no resume: a failed transfer is simply
//! started again from FileStart.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

/// Default chunk size for file transfers (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Progress value reported when a transfer fails.
pub const PROGRESS_FAILED: i32 = -1;

/// Progress value reported exactly once after FileEnd.
pub const PROGRESS_DONE: i32 = 100;

/// Which way a transfer is flowing, relative to the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// In-flight percentage: `floor(done * 100 / total)`, `0` when the total
/// is unknown, capped at 99 so that `100` is only ever reported once the
/// transfer has actually finished.
pub fn progress_percent(done: u64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let pct = (done as u128 * 100) / total as u128;
    pct.min(99) as i32
}

/// Rate limiter for progress callbacks.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` when a report is due and records it.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// A fully received artifact handed to the install collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Bytes actually written.
    pub size: u64,
    /// Size announced in FileStart (`-1` when unknown).
    pub expected_size: i64,
    /// Blake3 digest of the file contents.
    pub digest: [u8; 32],
}

impl Artifact {
    /// `false` when the announced size does not match what arrived.
    pub fn is_complete(&self) -> bool {
        self.expected_size < 0 || self.expected_size as u64 == self.size
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
