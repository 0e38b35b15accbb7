//! Platform collaborators the engine calls out to.
//!
//! The engine never touches the OS directly: notification display,
//! privileged power control, persistence and telemetry are all injected
//! through these traits. Every collaborator except the observer is
//! optional; a frame that needs a missing collaborator is logged and
//! dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::TetherError;
use crate::network::PeerInfo;
use crate::protocol::{AppEntry, Artifact, NotificationRecord, StatusReport, TransferDirection};

/// Connection and transfer events for the UI layer.
///
/// Callbacks run on engine tasks and must not block.
pub trait LinkObserver: Send + Sync {
    fn on_status_changed(&self, status: &str);
    fn on_device_connected(&self, peer_name: &str);
    fn on_device_disconnected(&self);
    fn on_error(&self, message: &str);
    /// More than one reachable peer was found; the user must pick one.
    fn on_candidates(&self, peers: &[PeerInfo]);
    fn on_app_list(&self, apps_json: &str);
    /// `0..=99` while running, `100` once on success, `-1` on failure.
    fn on_transfer_progress(&self, direction: TransferDirection, progress: i32);
}

/// Receives the peer's periodic device status.
pub trait TelemetryObserver: Send + Sync {
    fn on_remote_status(&self, status: &StatusReport);
}

/// Renders mirrored notifications locally.
pub trait NotificationPresenter: Send + Sync {
    fn render(&self, handle: u32, record: &NotificationRecord) -> Result<(), TetherError>;
    fn withdraw(&self, handle: u32);
}

/// The origin-side notification store, used to honour dismiss requests.
pub trait NotificationSource: Send + Sync {
    fn cancel(&self, key: &str);
}

/// Consumes a completed inbound artifact (e.g. installs it).
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
    async fn artifact_ready(&self, artifact: Artifact) -> Result<(), TetherError>;
}

/// Privileged power-off.
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn shutdown(&self) -> Result<(), TetherError>;
}

/// Remembers the chosen peer across restarts.
pub trait PeerStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, address: &str) -> Result<(), TetherError>;
    fn clear(&self) -> Result<(), TetherError>;
}

/// Local device telemetry and the DND switch.
pub trait DeviceStatus: Send + Sync {
    fn snapshot(&self) -> StatusReport;
    fn set_dnd(&self, enable: bool) -> Result<(), TetherError>;
}

/// Installed launchable applications.
pub trait AppCatalog: Send + Sync {
    fn installed_apps(&self) -> Vec<AppEntry>;
}

// ── Defaults ─────────────────────────────────────────────────────

/// Process-local peer store; forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryPeerStore {
    peer: Mutex<Option<String>>,
}

impl MemoryPeerStore {
    pub fn with_peer(address: impl Into<String>) -> Self {
        Self {
            peer: Mutex::new(Some(address.into())),
        }
    }
}

impl PeerStore for MemoryPeerStore {
    fn load(&self) -> Option<String> {
        self.peer.lock().ok().and_then(|p| p.clone())
    }

    fn save(&self, address: &str) -> Result<(), TetherError> {
        let mut peer = self
            .peer
            .lock()
            .map_err(|_| TetherError::collaborator("peer store", "lock poisoned"))?;
        *peer = Some(address.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TetherError> {
        let mut peer = self
            .peer
            .lock()
            .map_err(|_| TetherError::collaborator("peer store", "lock poisoned"))?;
        *peer = None;
        Ok(())
    }
}

/// The full set of collaborators handed to the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub observer: Arc<dyn LinkObserver>,
    pub peer_store: Arc<dyn PeerStore>,
    pub telemetry: Option<Arc<dyn TelemetryObserver>>,
    pub presenter: Option<Arc<dyn NotificationPresenter>>,
    pub source: Option<Arc<dyn NotificationSource>>,
    pub artifacts: Option<Arc<dyn ArtifactHandler>>,
    pub power: Option<Arc<dyn PowerControl>>,
    pub device: Option<Arc<dyn DeviceStatus>>,
    pub apps: Option<Arc<dyn AppCatalog>>,
}

impl Collaborators {
    pub fn new(observer: Arc<dyn LinkObserver>) -> Self {
        Self {
            observer,
            peer_store: Arc::new(MemoryPeerStore::default()),
            telemetry: None,
            presenter: None,
            source: None,
            artifacts: None,
            power: None,
            device: None,
            apps: None,
        }
    }

    pub fn with_peer_store(mut self, store: Arc<dyn PeerStore>) -> Self {
        self.peer_store = store;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryObserver>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_artifacts(mut self, handler: Arc<dyn ArtifactHandler>) -> Self {
        self.artifacts = Some(handler);
        self
    }

    pub fn with_power(mut self, power: Arc<dyn PowerControl>) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_device(mut self, device: Arc<dyn DeviceStatus>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_apps(mut self, apps: Arc<dyn AppCatalog>) -> Self {
        self.apps = Some(apps);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryPeerStore::default();
        assert_eq!(store.load(), None);
        store.save("AA:BB").unwrap();
        assert_eq!(store.load().as_deref(), Some("AA:BB"));
        store.clear().unwrap();
        assert_eq!(store.load(), None);
        assert_eq!(MemoryPeerStore::with_peer("x").load().as_deref(), Some("x"));
    }
}
