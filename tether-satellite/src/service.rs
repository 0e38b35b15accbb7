//! Satellite service core logic.
//!
//! Wires the configured collaborators into a responder
//! [`LinkEngine`] and keeps it running until stopped.

use std::sync::Arc;

use tether_core::{Collaborators, LinkEngine, TcpAcceptor, TetherError};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SatelliteConfig;
use crate::device::{
    CommandArtifactHandler, CommandPowerControl, LogObserver, LogPresenter, StaticAppCatalog,
    SysfsDeviceStatus,
};

// ── SatelliteService ─────────────────────────────────────────────

/// The top-level satellite service.
///
/// Listens for the hub, mirrors its notifications, accepts files and
/// carries out power and DND commands.
pub struct SatelliteService {
    engine: LinkEngine,
    presenter: Arc<LogPresenter>,
    stop: CancellationToken,
}

impl SatelliteService {
    /// Create a new service with the given config.
    pub fn new(config: SatelliteConfig) -> Result<Self, TetherError> {
        let presenter = Arc::new(LogPresenter::default());
        let device = Arc::new(SysfsDeviceStatus::new(
            config.device.power_supply_dir,
            config.device.net_dir,
            config.device.wifi_interface,
        ));
        let collab = Collaborators::new(Arc::new(LogObserver))
            .with_presenter(presenter.clone())
            .with_device(device)
            .with_power(Arc::new(CommandPowerControl::new(
                config.actions.shutdown_command,
                config.actions.shutdown_fallback_command,
            )))
            .with_artifacts(Arc::new(CommandArtifactHandler::new(config.actions.artifact_command)))
            .with_apps(Arc::new(StaticAppCatalog(config.apps)));
        let acceptor = Arc::new(TcpAcceptor::new(config.network.bind_addr));
        let engine = LinkEngine::responder(config.link, collab, acceptor)?;
        Ok(Self {
            engine,
            presenter,
            stop: CancellationToken::new(),
        })
    }

    /// Obtain a handle that stops [`run`](Self::run) when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn engine(&self) -> &LinkEngine {
        &self.engine
    }

    /// Notifications currently on display.
    pub fn presenter(&self) -> &LogPresenter {
        &self.presenter
    }

    /// Run the service until the stop handle is cancelled.
    pub async fn run(&self) {
        info!("satellite service starting");
        self.engine.start();
        self.stop.cancelled().await;
        self.engine.stop().await;
        info!("satellite service stopped");
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

// ── Tests ────────────────────────────────────────────────────────
