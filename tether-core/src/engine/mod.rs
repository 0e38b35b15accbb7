//! The connection manager.
//!
//! A [`LinkEngine`] owns the link for one role. It runs a lifecycle task
//! (dial/scan/retry for the initiator, listen/accept for the responder);
//! each established stream becomes a session with its own dispatch loop,
//! heartbeat and telemetry tasks, all hanging off a per-connection
//! `CancellationToken`.

mod dispatch;
mod lifecycle;
mod session;

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collab::Collaborators;
use crate::config::LinkConfig;
use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;
use crate::network::{Acceptor, Connector, LinkSender, PeerInfo};
use crate::protocol::{NotificationRecord, SourceNotification, TextCommand, TransferDirection};
use crate::relay::NotificationRelay;
use crate::state::{ConnectionPhase, LinkState, Role};
use crate::transfer::{self, InboundTransfer};

use lifecycle::Entry;

pub(crate) enum Transport {
    Initiator(Arc<dyn Connector>),
    Responder(Arc<dyn Acceptor>),
}

struct Lifecycle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// State shared between the public handle and the engine's tasks.
pub(crate) struct Shared {
    config: LinkConfig,
    collab: Collaborators,
    transport: Transport,
    state: Mutex<LinkState>,
    sender: LinkSender,
    relay: NotificationRelay,
    inbound: tokio::sync::Mutex<InboundTransfer>,
    lifecycle: Mutex<Option<Lifecycle>>,
    connection: Mutex<Option<CancellationToken>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection_token(&self) -> Option<CancellationToken> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_connection(&self, token: Option<CancellationToken>) {
        *self.connection.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Apply a phase transition, logging (not failing) if it is invalid.
    fn advance(&self, transition: impl FnOnce(&mut ConnectionPhase) -> Result<(), TetherError>) {
        let mut state = self.state();
        let from = state.phase;
        if let Err(e) = transition(&mut state.phase) {
            warn!(phase = %from, "ignored transition: {e}");
        }
    }

    fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.state().status = status.clone();
        info!(%status, "status");
        self.collab.observer.on_status_changed(&status);
    }

    fn report_error(&self, message: &str) {
        warn!("{message}");
        self.collab.observer.on_error(message);
    }

    fn progress(&self, direction: TransferDirection, pct: i32) {
        debug!(%direction, pct, "transfer progress");
        self.collab.observer.on_transfer_progress(direction, pct);
    }

    fn touch(&self) {
        self.state().touch();
    }

    /// Send an ordinary frame on the current connection. A write failure
    /// tears the connection down; teardown abandons the write.
    async fn send(&self, frame: Frame) -> Result<(), TetherError> {
        let token = self.connection_token().ok_or(TetherError::NotConnected)?;
        let result = tokio::select! {
            _ = token.cancelled() => Err(TetherError::NotConnected),
            result = self.sender.send(frame) => result,
        };
        if let Err(e) = &result {
            if e.is_fatal_to_link() {
                token.cancel();
            }
        }
        result
    }

    /// Replace the running lifecycle task. The new task starts only after
    /// the previous one has fully unwound.
    fn replace_lifecycle<F, Fut>(&self, build: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.take();
        if let Some(prev) = &previous {
            prev.token.cancel();
        }
        let token = CancellationToken::new();
        let run = build(token.clone());
        let handle = tokio::spawn(async move {
            if let Some(prev) = previous {
                if let Err(e) = prev.handle.await {
                    warn!("previous lifecycle ended abnormally: {e}");
                }
            }
            run.await;
        });
        *slot = Some(Lifecycle { token, handle });
    }

    fn lifecycle_running(&self) -> bool {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished())
    }
}

/// Handle to a running link. Cheap to clone.
#[derive(Clone)]
pub struct LinkEngine {
    shared: Arc<Shared>,
}

impl LinkEngine {
    /// Engine for the dialing side.
    pub fn initiator(
        config: LinkConfig,
        collab: Collaborators,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, TetherError> {
        Self::build(config, collab, Transport::Initiator(connector))
    }

    /// Engine for the listening side.
    pub fn responder(
        config: LinkConfig,
        collab: Collaborators,
        acceptor: Arc<dyn Acceptor>,
    ) -> Result<Self, TetherError> {
        Self::build(config, collab, Transport::Responder(acceptor))
    }

    fn build(
        config: LinkConfig,
        collab: Collaborators,
        transport: Transport,
    ) -> Result<Self, TetherError> {
        config.validate()?;
        let role = match transport {
            Transport::Initiator(_) => Role::Initiator,
            Transport::Responder(_) => Role::Responder,
        };
        let inbound = InboundTransfer::new(config.artifact_path(), config.progress_interval());
        let sender = LinkSender::with_write_timeout(config.liveness_timeout());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                collab,
                transport,
                state: Mutex::new(LinkState::new(role)),
                sender,
                relay: NotificationRelay::new(),
                inbound: tokio::sync::Mutex::new(inbound),
                lifecycle: Mutex::new(None),
                connection: Mutex::new(None),
            }),
        })
    }

    // ── Introspection ────────────────────────────────────────────

    pub fn role(&self) -> Role {
        self.shared.state().role
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.state().phase
    }

    pub fn status(&self) -> String {
        self.shared.state().status.clone()
    }

    pub fn peer_name(&self) -> Option<String> {
        self.shared.state().peer_name.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.phase().is_connected()
    }

    pub fn is_transferring(&self) -> bool {
        self.shared.state().transferring
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// Local notification key → handle mapping.
    pub fn relay(&self) -> &NotificationRelay {
        &self.shared.relay
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the role's lifecycle. The initiator dials its remembered peer
    /// or scans; the responder listens. No-op while already running.
    pub fn start(&self) {
        if self.shared.lifecycle_running() {
            debug!("engine already running");
            return;
        }
        let shared = self.shared.clone();
        self.shared
            .replace_lifecycle(move |token| lifecycle::run(shared, token, Entry::Auto));
    }

    /// Initiator only: scan all candidates even if a peer is remembered.
    pub fn scan(&self) -> Result<(), TetherError> {
        self.require_initiator()?;
        let shared = self.shared.clone();
        self.shared
            .replace_lifecycle(move |token| lifecycle::run(shared, token, Entry::Scan));
        Ok(())
    }

    /// Initiator only: remember `peer` and keep connecting to it.
    pub fn connect_to(&self, peer: PeerInfo) -> Result<(), TetherError> {
        self.require_initiator()?;
        self.shared.collab.peer_store.save(&peer.address)?;
        info!(%peer, "peer selected");
        let shared = self.shared.clone();
        self.shared
            .replace_lifecycle(move |token| lifecycle::run(shared, token, Entry::Peer(peer)));
        Ok(())
    }

    /// Cancel everything, close the stream and enter `Stopped`.
    pub async fn stop(&self) {
        let previous = self
            .shared
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(lifecycle) = previous {
            lifecycle.token.cancel();
            if let Err(e) = lifecycle.handle.await {
                warn!("lifecycle task ended abnormally: {e}");
            }
        }
        self.shared.state().phase.stop();
        self.shared.set_status("Stopped");
    }

    /// Forget the remembered peer and stop.
    pub async fn forget_peer(&self) -> Result<(), TetherError> {
        self.stop().await;
        self.shared.collab.peer_store.clear()
    }

    fn require_initiator(&self) -> Result<(), TetherError> {
        match self.shared.transport {
            Transport::Initiator(_) => Ok(()),
            Transport::Responder(_) => Err(TetherError::ProtocolViolation(
                "operation requires the initiator role",
            )),
        }
    }

    // ── Outbound messages ────────────────────────────────────────

    /// Mirror an origin notification if the mirroring policy admits it.
    /// Returns whether a frame was sent.
    pub async fn post_notification(
        &self,
        notification: &SourceNotification,
    ) -> Result<bool, TetherError> {
        if !self.shared.config.mirroring.admits(notification) {
            debug!(key = %notification.record.key, "notification not mirrored");
            return Ok(false);
        }
        self.send_record(notification.record.clone()).await?;
        Ok(true)
    }

    /// Send a record unconditionally as `NotificationPosted`.
    pub async fn send_record(&self, record: NotificationRecord) -> Result<(), TetherError> {
        self.shared.send(record.into_frame()?).await
    }

    /// Tell the peer an origin notification went away.
    pub async fn remove_notification(&self, key: &str) -> Result<(), TetherError> {
        if !self.shared.config.mirroring.forwards_removals() {
            return Ok(());
        }
        self.shared
            .send(Frame::text(MessageType::NotificationRemoved, key)?)
            .await
    }

    /// The user dismissed a mirrored notification here: forget it locally
    /// and ask the origin to dismiss the original.
    pub async fn dismiss_local(&self, key: &str) -> Result<(), TetherError> {
        self.shared.relay.evict(key);
        self.shared
            .send(Frame::text(MessageType::RequestDismiss, key)?)
            .await
    }

    pub async fn request_app_list(&self) -> Result<(), TetherError> {
        self.shared.send(TextCommand::RequestApps.into_frame()?).await
    }

    /// Returns once the frame has been flushed. Never acknowledged.
    pub async fn send_shutdown(&self) -> Result<(), TetherError> {
        self.shared.send(Frame::shutdown()).await
    }

    pub async fn send_dnd(&self, enable: bool) -> Result<(), TetherError> {
        self.shared.send(Frame::set_dnd(enable)).await
    }

    // ── File transfer ────────────────────────────────────────────

    /// Stream `source` to the peer as one file of `size` bytes (`-1` when
    /// unknown).
    ///
    /// Refused synchronously with [`TetherError::NotConnected`] or
    /// [`TetherError::TransferInProgress`]; otherwise the transfer runs in
    /// the background and the returned handle yields the bytes sent.
    pub fn send_file<R>(
        &self,
        source: R,
        size: i64,
    ) -> Result<JoinHandle<Result<u64, TetherError>>, TetherError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let token = self
            .shared
            .connection_token()
            .ok_or(TetherError::NotConnected)?;
        let lane = self.shared.sender.try_begin_transfer()?;
        self.shared.state().transferring = true;
        self.shared.progress(TransferDirection::Upload, 0);
        info!(size, "sending file");

        let shared = self.shared.clone();
        Ok(tokio::spawn(async move {
            let pump = transfer::send_stream(
                &lane,
                source,
                size,
                shared.config.chunk_size,
                shared.config.progress_interval(),
                |pct| shared.progress(TransferDirection::Upload, pct),
                || shared.touch(),
            );
            let result = tokio::select! {
                _ = token.cancelled() => Err(TetherError::NotConnected),
                r = pump => r,
            };
            drop(lane);
            shared.state().transferring = false;

            match &result {
                Ok(sent) => {
                    shared.progress(TransferDirection::Upload, crate::protocol::file::PROGRESS_DONE);
                    info!(sent, "file sent");
                }
                Err(e) => {
                    shared.progress(
                        TransferDirection::Upload,
                        crate::protocol::file::PROGRESS_FAILED,
                    );
                    shared.report_error(&format!("File transfer failed: {e}"));
                    if e.is_fatal_to_link() {
                        token.cancel();
                    }
                }
            }
            result
        }))
    }

    /// Send the file at `path`.
    pub async fn send_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<JoinHandle<Result<u64, TetherError>>, TetherError> {
        if !self.is_connected() {
            return Err(TetherError::NotConnected);
        }
        if self.is_transferring() {
            return Err(TetherError::TransferInProgress);
        }
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let size = file.metadata().await?.len() as i64;
        self.send_file(file, size)
    }
}
