//! File-backed [`PeerStore`]: the remembered satellite survives restarts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tether_core::{PeerStore, TetherError};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct Remembered {
    address: String,
}

/// Stores `{"address": "..."}` at `path`. A missing or unreadable file
/// means no peer is remembered.
#[derive(Debug, Clone)]
pub struct FilePeerStore {
    path: PathBuf,
}

impl FilePeerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PeerStore for FilePeerStore {
    fn load(&self) -> Option<String> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice::<Remembered>(&bytes) {
            Ok(r) if !r.address.is_empty() => Some(r.address),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring corrupt peer file: {e}");
                None
            }
        }
    }

    fn save(&self, address: &str) -> Result<(), TetherError> {
        let json = serde_json::to_vec(&Remembered {
            address: address.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        debug!(address, "peer remembered");
        Ok(())
    }

    fn clear(&self) -> Result<(), TetherError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
