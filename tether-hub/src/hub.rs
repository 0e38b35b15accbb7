//! Hub side of the link: owns the initiator engine, runs operator
//! commands and relays engine callbacks to the dashboard through an
//! `mpsc::UnboundedSender<HubEvent>`.

use std::sync::{Arc, Mutex};

use tether_core::protocol::command::decode_app_list;
use tether_core::{
    AppEntry, Collaborators, LinkEngine, LinkObserver, NotificationRecord, NotificationSource,
    PeerInfo, SourceNotification, StatusReport, TelemetryObserver, TetherError,
    TransferDirection,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::command::{HELP, HubCommand};
use crate::config::HubConfig;
use crate::store::FilePeerStore;

/// Everything the dashboard redraws on.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Log(String),
    Status(String),
    Connected(String),
    Disconnected,
    Error(String),
    Candidates(Vec<PeerInfo>),
    Apps(Vec<AppEntry>),
    Progress(TransferDirection, i32),
    Telemetry(StatusReport),
}

/// Forwards engine callbacks as [`HubEvent`]s and keeps the latest
/// candidate list for `connect <index>`.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<HubEvent>,
    candidates: Mutex<Vec<PeerInfo>>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<HubEvent>) -> Self {
        Self {
            tx,
            candidates: Mutex::new(Vec::new()),
        }
    }

    fn emit(&self, event: HubEvent) {
        let _ = self.tx.send(event);
    }

    fn candidate(&self, index: usize) -> Option<PeerInfo> {
        self.candidates.lock().ok()?.get(index).cloned()
    }
}

impl LinkObserver for ChannelObserver {
    fn on_status_changed(&self, status: &str) {
        self.emit(HubEvent::Status(status.to_string()));
    }

    fn on_device_connected(&self, peer_name: &str) {
        self.emit(HubEvent::Connected(peer_name.to_string()));
    }

    fn on_device_disconnected(&self) {
        self.emit(HubEvent::Disconnected);
    }

    fn on_error(&self, message: &str) {
        self.emit(HubEvent::Error(message.to_string()));
    }

    fn on_candidates(&self, peers: &[PeerInfo]) {
        if let Ok(mut list) = self.candidates.lock() {
            *list = peers.to_vec();
        }
        self.emit(HubEvent::Candidates(peers.to_vec()));
    }

    fn on_app_list(&self, apps_json: &str) {
        match decode_app_list(apps_json) {
            Ok(apps) => self.emit(HubEvent::Apps(apps)),
            Err(e) => self.emit(HubEvent::Error(format!("Bad app list: {e}"))),
        }
    }

    fn on_transfer_progress(&self, direction: TransferDirection, progress: i32) {
        self.emit(HubEvent::Progress(direction, progress));
    }
}

impl TelemetryObserver for ChannelObserver {
    fn on_remote_status(&self, status: &StatusReport) {
        self.emit(HubEvent::Telemetry(status.clone()));
    }
}

/// Hand-mirrored notifications have no origin store; a dismiss from the
/// satellite is only surfaced in the log.
struct LoggedSource {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl NotificationSource for LoggedSource {
    fn cancel(&self, key: &str) {
        info!(key, "satellite dismissed notification");
        let _ = self.tx.send(HubEvent::Log(format!("- dismissed on satellite: {key}")));
    }
}

/// The hub: one initiator engine plus the command dispatcher.
pub struct Hub {
    engine: LinkEngine,
    observer: Arc<ChannelObserver>,
    ui_tx: mpsc::UnboundedSender<HubEvent>,
    next_key: u64,
}

impl Hub {
    pub fn new(config: &HubConfig, ui_tx: mpsc::UnboundedSender<HubEvent>) -> Result<Self, TetherError> {
        let observer = Arc::new(ChannelObserver::new(ui_tx.clone()));
        let collab = Collaborators::new(observer.clone())
            .with_telemetry(observer.clone())
            .with_peer_store(Arc::new(FilePeerStore::new(&config.storage.peer_file)))
            .with_source(Arc::new(LoggedSource { tx: ui_tx.clone() }));
        let engine = LinkEngine::initiator(config.link.clone(), collab, Arc::new(config.connector()))?;
        Ok(Self {
            engine,
            observer,
            ui_tx,
            next_key: 1,
        })
    }

    pub fn engine(&self) -> &LinkEngine {
        &self.engine
    }

    pub fn start(&self) {
        self.engine.start();
    }

    pub async fn stop(&self) {
        self.engine.stop().await;
    }

    /// Ordinary sends queue behind a running transfer, so the console
    /// refuses them instead of blocking until it ends.
    fn ensure_idle(&self) -> Result<(), TetherError> {
        if self.engine.is_transferring() {
            return Err(TetherError::TransferInProgress);
        }
        Ok(())
    }

    fn log(&self, line: impl Into<String>) {
        let _ = self.ui_tx.send(HubEvent::Log(line.into()));
    }

    /// Parse and run one console line.
    pub async fn execute_command(&mut self, line: &str) -> Result<(), TetherError> {
        let command: HubCommand = line
            .parse()
            .map_err(|e: crate::command::ParseCommandError| TetherError::Other(e.to_string()))?;
        self.execute(command).await
    }

    pub async fn execute(&mut self, command: HubCommand) -> Result<(), TetherError> {
        match command {
            HubCommand::Scan => self.engine.scan()?,
            HubCommand::Connect(target) => {
                let peer = match target.parse::<usize>() {
                    Ok(index) => self
                        .observer
                        .candidate(index)
                        .ok_or_else(|| TetherError::Other(format!("no candidate #{index}")))?,
                    Err(_) => PeerInfo::from_address(target),
                };
                self.engine.connect_to(peer)?;
            }
            HubCommand::Forget => {
                self.engine.forget_peer().await?;
                self.log("- remembered satellite forgotten");
            }
            HubCommand::Start => self.engine.start(),
            HubCommand::Stop => self.engine.stop().await,
            HubCommand::Send(path) => {
                let handle = self.engine.send_path(&path).await?;
                self.log(format!("[SEND] {}", path.display()));
                let tx = self.ui_tx.clone();
                tokio::spawn(async move {
                    let line = match handle.await {
                        Ok(Ok(bytes)) => format!("[DONE] {} ({bytes} bytes)", path.display()),
                        Ok(Err(e)) => format!("send failed: {e}"),
                        Err(e) => format!("send task failed: {e}"),
                    };
                    let _ = tx.send(HubEvent::Log(line));
                });
            }
            HubCommand::Shutdown => {
                self.ensure_idle()?;
                self.engine.send_shutdown().await?;
                self.log("[SEND] shutdown");
            }
            HubCommand::Dnd(enable) => {
                self.ensure_idle()?;
                self.engine.send_dnd(enable).await?;
                self.log(format!("[SEND] dnd {}", if enable { "on" } else { "off" }));
            }
            HubCommand::Apps => {
                self.ensure_idle()?;
                self.engine.request_app_list().await?;
            }
            HubCommand::Notify {
                package,
                title,
                text,
            } => {
                self.ensure_idle()?;
                let key = format!("hub|{package}|{}", self.next_key);
                self.next_key += 1;
                let notification = SourceNotification {
                    record: NotificationRecord::new(package, &key, title, text),
                    ongoing: false,
                };
                if self.engine.post_notification(&notification).await? {
                    self.log(format!("[SEND] notification {key}"));
                } else {
                    warn!(%key, "notification filtered by mirroring policy");
                    self.log(format!("- not mirrored (policy): {key}"));
                }
            }
            HubCommand::Remove(key) => {
                self.ensure_idle()?;
                self.engine.remove_notification(&key).await?;
            }
            HubCommand::Help => {
                for line in HELP {
                    self.log(format!("- {line}"));
                }
            }
        }
        Ok(())
    }
}
