//! Local collaborators: how the satellite shows notifications, reports
//! its status and carries out commands from the hub.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tether_core::{
    AppCatalog, AppEntry, Artifact, ArtifactHandler, DeviceStatus, LinkObserver,
    NotificationPresenter, NotificationRecord, PeerInfo, PowerControl, StatusReport,
    TetherError, TransferDirection,
};
use tokio::process::Command;
use tracing::{debug, info, warn};

// ── Observer ─────────────────────────────────────────────────────

/// The satellite is headless: link events become log lines.
pub struct LogObserver;

impl LinkObserver for LogObserver {
    fn on_status_changed(&self, status: &str) {
        info!(status, "link status");
    }

    fn on_device_connected(&self, peer_name: &str) {
        info!(peer = peer_name, "hub connected");
    }

    fn on_device_disconnected(&self) {
        info!("hub disconnected");
    }

    fn on_error(&self, message: &str) {
        warn!("{message}");
    }

    fn on_candidates(&self, _peers: &[PeerInfo]) {}

    fn on_app_list(&self, _apps_json: &str) {}

    fn on_transfer_progress(&self, direction: TransferDirection, progress: i32) {
        debug!(%direction, progress, "transfer progress");
    }
}

// ── Notifications ────────────────────────────────────────────────

/// Keeps the mirrored notifications currently on display and logs each
/// change.
#[derive(Debug, Default)]
pub struct LogPresenter {
    shown: Mutex<BTreeMap<u32, NotificationRecord>>,
}

impl LogPresenter {
    /// Snapshot of what is on display, by handle.
    pub fn shown(&self) -> Vec<(u32, NotificationRecord)> {
        self.shown
            .lock()
            .map(|m| m.iter().map(|(h, r)| (*h, r.clone())).collect())
            .unwrap_or_default()
    }
}

impl NotificationPresenter for LogPresenter {
    fn render(&self, handle: u32, record: &NotificationRecord) -> Result<(), TetherError> {
        info!(handle, package = %record.package, title = %record.title, "{}", record.text);
        self.shown
            .lock()
            .map_err(|_| TetherError::collaborator("presenter", "lock poisoned"))?
            .insert(handle, record.clone());
        Ok(())
    }

    fn withdraw(&self, handle: u32) {
        if let Ok(mut shown) = self.shown.lock() {
            if shown.remove(&handle).is_some() {
                info!(handle, "notification withdrawn");
            }
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────

async fn run_command(what: &'static str, argv: &[String], extra: Option<&Path>) -> Result<(), TetherError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(TetherError::collaborator(what, "no command configured"));
    };
    let mut command = Command::new(program);
    command.args(args);
    if let Some(path) = extra {
        command.arg(path);
    }
    let status = command
        .status()
        .await
        .map_err(|e| TetherError::collaborator(what, format!("{program}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(TetherError::collaborator(what, format!("{program} exited with {status}")))
    }
}

/// Powers the device off through a configured command, trying the
/// fallback command if the first one fails.
pub struct CommandPowerControl {
    argv: Vec<String>,
    fallback: Vec<String>,
}

impl CommandPowerControl {
    pub fn new(argv: Vec<String>, fallback: Vec<String>) -> Self {
        Self { argv, fallback }
    }
}

#[async_trait]
impl PowerControl for CommandPowerControl {
    async fn shutdown(&self) -> Result<(), TetherError> {
        info!(command = ?self.argv, "powering off");
        let Err(e) = run_command("power control", &self.argv, None).await else {
            return Ok(());
        };
        if self.fallback.is_empty() {
            return Err(e);
        }
        warn!("{e}; trying {:?}", self.fallback);
        run_command("power control", &self.fallback, None).await
    }
}

/// Hands each received artifact to a configured command, or just logs
/// it when none is set.
pub struct CommandArtifactHandler {
    argv: Vec<String>,
}

impl CommandArtifactHandler {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

#[async_trait]
impl ArtifactHandler for CommandArtifactHandler {
    async fn artifact_ready(&self, artifact: Artifact) -> Result<(), TetherError> {
        info!(
            path = %artifact.path.display(),
            size = artifact.size,
            complete = artifact.is_complete(),
            blake3 = %artifact.digest_hex(),
            "artifact received"
        );
        if !artifact.is_complete() {
            return Err(TetherError::collaborator(
                "artifact handler",
                format!("expected {} bytes, got {}", artifact.expected_size, artifact.size),
            ));
        }
        if self.argv.is_empty() {
            return Ok(());
        }
        run_command("artifact handler", &self.argv, Some(&artifact.path)).await
    }
}

// ── Device status ────────────────────────────────────────────────

/// Battery and network state from sysfs; DND is held in memory.
pub struct SysfsDeviceStatus {
    power_supply_dir: PathBuf,
    net_dir: PathBuf,
    wifi_interface: String,
    dnd: AtomicBool,
}

impl SysfsDeviceStatus {
    pub fn new(power_supply_dir: PathBuf, net_dir: PathBuf, wifi_interface: String) -> Self {
        Self {
            power_supply_dir,
            net_dir,
            wifi_interface,
            dnd: AtomicBool::new(false),
        }
    }

    /// First supply of type `Battery`: (capacity, charging).
    fn battery(&self) -> Option<(i32, bool)> {
        let entries = std::fs::read_dir(&self.power_supply_dir).ok()?;
        for entry in entries.flatten() {
            let dir = entry.path();
            if read_trimmed(&dir.join("type")).as_deref() != Some("Battery") {
                continue;
            }
            let capacity = read_trimmed(&dir.join("capacity"))?.parse::<i32>().ok()?;
            let charging = matches!(
                read_trimmed(&dir.join("status")).as_deref(),
                Some("Charging") | Some("Full")
            );
            return Some((capacity.clamp(0, 100), charging));
        }
        None
    }

    fn wifi(&self) -> String {
        let state = read_trimmed(&self.net_dir.join(&self.wifi_interface).join("operstate"));
        match state.as_deref() {
            Some("up") => self.wifi_interface.clone(),
            Some(_) => "disconnected".into(),
            None => "unavailable".into(),
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

impl DeviceStatus for SysfsDeviceStatus {
    fn snapshot(&self) -> StatusReport {
        let (battery, charging) = self.battery().unwrap_or((0, false));
        StatusReport {
            battery,
            charging,
            dnd: self.dnd.load(Ordering::SeqCst),
            wifi: self.wifi(),
        }
    }

    fn set_dnd(&self, enable: bool) -> Result<(), TetherError> {
        info!(enable, "do-not-disturb");
        self.dnd.store(enable, Ordering::SeqCst);
        Ok(())
    }
}

/// Fixed application list from the config file.
pub struct StaticAppCatalog(pub Vec<AppEntry>);

impl AppCatalog for StaticAppCatalog {
    fn installed_apps(&self) -> Vec<AppEntry> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(root: &Path) -> SysfsDeviceStatus {
        let ac = root.join("power/AC");
        std::fs::create_dir_all(&ac).unwrap();
        std::fs::write(ac.join("type"), "Mains\n").unwrap();
        let bat = root.join("power/BAT0");
        std::fs::create_dir_all(&bat).unwrap();
        std::fs::write(bat.join("type"), "Battery\n").unwrap();
        std::fs::write(bat.join("capacity"), "64\n").unwrap();
        std::fs::write(bat.join("status"), "Charging\n").unwrap();
        let wlan = root.join("net/wlan0");
        std::fs::create_dir_all(&wlan).unwrap();
        std::fs::write(wlan.join("operstate"), "up\n").unwrap();
        SysfsDeviceStatus::new(root.join("power"), root.join("net"), "wlan0".into())
    }

    #[test]
    fn reads_battery_and_wifi() {
        let dir = tempfile::tempdir().unwrap();
        let device = fake_sysfs(dir.path());
        let report = device.snapshot();
        assert_eq!(report.battery, 64);
        assert!(report.charging);
        assert_eq!(report.wifi, "wlan0");
        assert!(!report.dnd);

        device.set_dnd(true).unwrap();
        assert!(device.snapshot().dnd);
    }

    #[test]
    fn missing_sysfs_reports_zero_values() {
        let dir = tempfile::tempdir().unwrap();
        let device = SysfsDeviceStatus::new(dir.path().join("x"), dir.path().join("y"), "wlan0".into());
        let report = device.snapshot();
        assert_eq!(report.battery, 0);
        assert_eq!(report.wifi, "unavailable");
    }

    #[test]
    fn presenter_tracks_shown_notifications() {
        let presenter = LogPresenter::default();
        let record = NotificationRecord::new("com.chat", "k1", "Alice", "hi");
        presenter.render(1000, &record).unwrap();
        presenter.render(1000, &record).unwrap();
        assert_eq!(presenter.shown().len(), 1);
        presenter.withdraw(1000);
        presenter.withdraw(1000);
        assert!(presenter.shown().is_empty());
    }

    #[tokio::test]
    async fn empty_power_command_is_an_error() {
        let power = CommandPowerControl::new(Vec::new(), Vec::new());
        assert!(matches!(
            power.shutdown().await,
            Err(TetherError::Collaborator { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_shutdown_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("powered-off");
        let power = CommandPowerControl::new(
            vec!["false".into()],
            vec!["touch".into(), marker.display().to_string()],
        );
        power.shutdown().await.unwrap();
        assert!(marker.exists());

        let stuck = CommandPowerControl::new(vec!["false".into()], vec!["false".into()]);
        assert!(stuck.shutdown().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifact_command_receives_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let artifact_path = dir.path().join("incoming.pkg");
        std::fs::write(&artifact_path, b"data").unwrap();
        let marker = dir.path().join("copied.pkg");

        let handler = CommandArtifactHandler::new(vec![
            "sh".into(),
            "-c".into(),
            format!("cp \"$0\" {}", marker.display()),
        ]);
        handler
            .artifact_ready(Artifact {
                path: artifact_path,
                size: 4,
                expected_size: 4,
                digest: *blake3::hash(b"data").as_bytes(),
            })
            .await
            .unwrap();
        assert_eq!(std::fs::read(marker).unwrap(), b"data");
    }

    #[tokio::test]
    async fn incomplete_artifact_is_rejected() {
        let handler = CommandArtifactHandler::new(Vec::new());
        let result = handler
            .artifact_ready(Artifact {
                path: PathBuf::from("/nonexistent"),
                size: 3,
                expected_size: 10,
                digest: [0; 32],
            })
            .await;
        assert!(result.is_err());
    }
}
