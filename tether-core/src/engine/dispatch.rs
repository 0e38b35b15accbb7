//! Per-connection read loop: decode frames and route them by type.

use std::sync::Arc;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::Shared;
use super::session::SessionEnd;
use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;
use crate::network::FrameReader;
use crate::protocol::command::encode_app_list;
use crate::protocol::file::{PROGRESS_DONE, PROGRESS_FAILED};
use crate::protocol::status::parse_dnd;
use crate::protocol::{NotificationRecord, StatusReport, TextCommand, TransferDirection};
use crate::task::{TaskSet, with_deadline};

pub(super) async fn run(
    shared: &Arc<Shared>,
    mut reader: FrameReader,
    tasks: &mut TaskSet,
) -> SessionEnd {
    let token = tasks.token().clone();
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return SessionEnd::Cancelled,
            next = reader.next() => next,
        };
        let frame = match next {
            None => return SessionEnd::Closed,
            Some(Err(e)) => return SessionEnd::Failed(e),
            Some(Ok(frame)) => frame,
        };

        shared.touch();
        trace!(kind = %frame.kind(), len = frame.payload_len(), "recv");
        if let Err(e) = handle(shared, frame, tasks).await {
            if e.is_fatal_to_link() {
                return SessionEnd::Failed(e);
            }
            warn!("frame dropped: {e}");
        }
    }
}

async fn handle(shared: &Arc<Shared>, frame: Frame, tasks: &mut TaskSet) -> Result<(), TetherError> {
    if frame.kind().is_empty_payload() && frame.payload_len() > 0 {
        return Err(TetherError::MalformedPayload {
            kind: "empty",
            reason: format!("{} carries {} bytes", frame.kind(), frame.payload_len()),
        });
    }
    match frame.kind() {
        MessageType::Heartbeat => trace!("heartbeat"),
        MessageType::TextCommand => on_text_command(shared, frame.payload_str()?, tasks)?,
        MessageType::NotificationPosted => on_posted(shared, &frame)?,
        MessageType::NotificationRemoved => on_removed(shared, frame.payload_str()?),
        MessageType::RequestDismiss => on_dismiss(shared, frame.payload_str()?),
        MessageType::FileStart => on_file_start(shared, frame.file_start_size()?).await,
        MessageType::FileChunk => on_file_chunk(shared, frame.payload()).await,
        MessageType::FileEnd => on_file_end(shared).await,
        MessageType::ShutdownCommand => on_shutdown(shared),
        MessageType::StatusUpdate => on_status(shared, &frame)?,
        MessageType::SetDnd => on_set_dnd(shared, parse_dnd(frame.payload()), tasks),
    }
    Ok(())
}

// ── Text commands ────────────────────────────────────────────────

fn on_text_command(shared: &Arc<Shared>, text: &str, tasks: &mut TaskSet) -> Result<(), TetherError> {
    match TextCommand::parse(text) {
        TextCommand::RequestApps => {
            let Some(catalog) = shared.collab.apps.clone() else {
                debug!("app list requested but no catalog configured");
                return Ok(());
            };
            let shared = shared.clone();
            tasks.spawn("app-list", async move {
                let apps = catalog.installed_apps();
                let reply = encode_app_list(&apps)
                    .and_then(|json| TextCommand::AppList(json).into_frame());
                match reply {
                    Ok(frame) => {
                        if let Err(e) = shared.send(frame).await {
                            warn!("app list not sent: {e}");
                        } else {
                            debug!(count = apps.len(), "app list sent");
                        }
                    }
                    Err(e) => warn!("cannot encode app list: {e}"),
                }
            });
        }
        TextCommand::AppList(json) => shared.collab.observer.on_app_list(&json),
        TextCommand::Unknown(text) => debug!(%text, "unknown text command ignored"),
    }
    Ok(())
}

// ── Notifications ────────────────────────────────────────────────

fn on_posted(shared: &Shared, frame: &Frame) -> Result<(), TetherError> {
    let record = NotificationRecord::from_bytes(frame.payload())?;
    match &shared.collab.presenter {
        Some(presenter) => {
            if let Err(e) = shared.relay.show(&record, presenter.as_ref()) {
                warn!(key = %record.key, "notification not shown: {e}");
            }
        }
        None => debug!(key = %record.key, "no presenter, notification ignored"),
    }
    Ok(())
}

fn on_removed(shared: &Shared, key: &str) {
    match &shared.collab.presenter {
        Some(presenter) => {
            shared.relay.withdraw(key, presenter.as_ref());
        }
        None => {
            shared.relay.evict(key);
        }
    }
}

fn on_dismiss(shared: &Shared, key: &str) {
    on_removed(shared, key);
    match &shared.collab.source {
        Some(source) => {
            debug!(key, "dismissing origin notification");
            source.cancel(key);
        }
        None => debug!(key, "no notification source, dismiss ignored"),
    }
}

// ── File receive ─────────────────────────────────────────────────

async fn on_file_start(shared: &Shared, size: i64) {
    let opened = shared.inbound.lock().await.start(size).await;
    match opened {
        Ok(()) => {
            shared.state().last_chunk_at = Some(Instant::now());
            shared.progress(TransferDirection::Download, 0);
        }
        Err(e) => shared.report_error(&format!("Cannot receive file: {e}")),
    }
}

async fn on_file_chunk(shared: &Shared, data: &[u8]) {
    let written = shared.inbound.lock().await.chunk(data).await;
    match written {
        Ok(progress) => {
            shared.state().last_chunk_at = Some(Instant::now());
            if let Some(pct) = progress {
                shared.progress(TransferDirection::Download, pct);
            }
        }
        Err(TetherError::ProtocolViolation(_)) => trace!("chunk without open transfer discarded"),
        Err(e) => warn!("chunk write failed: {e}"),
    }
}

async fn on_file_end(shared: &Shared) {
    let finished = shared.inbound.lock().await.finish().await;
    shared.state().last_chunk_at = None;
    match finished {
        Ok(Some(artifact)) => {
            shared.progress(TransferDirection::Download, PROGRESS_DONE);
            if artifact.size == 0 {
                debug!("empty artifact, not handed off");
                return;
            }
            let Some(handler) = shared.collab.artifacts.clone() else {
                info!(path = %artifact.path.display(), "artifact received, no handler configured");
                return;
            };
            let observer = shared.collab.observer.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.artifact_ready(artifact).await {
                    let message = format!("Artifact handoff failed: {e}");
                    warn!("{message}");
                    observer.on_error(&message);
                }
            });
        }
        Ok(None) => debug!("FileEnd without open transfer"),
        Err(e) => {
            shared.progress(TransferDirection::Download, PROGRESS_FAILED);
            shared.report_error(&format!("File receive failed: {e}"));
        }
    }
}

// ── Device commands ──────────────────────────────────────────────

fn on_shutdown(shared: &Shared) {
    let Some(power) = shared.collab.power.clone() else {
        warn!("shutdown requested but no power control configured");
        return;
    };
    info!("shutdown requested by peer");
    let observer = shared.collab.observer.clone();
    let deadline = shared.config.shutdown_timeout();
    tokio::spawn(async move {
        let message = match with_deadline(deadline, power.shutdown()).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("Shutdown failed: {e}"),
            Err(e) => format!("Shutdown failed: {e}"),
        };
        warn!("{message}");
        observer.on_error(&message);
    });
}

fn on_status(shared: &Shared, frame: &Frame) -> Result<(), TetherError> {
    let report = StatusReport::from_bytes(frame.payload())?;
    trace!(?report, "remote status");
    if let Some(telemetry) = &shared.collab.telemetry {
        telemetry.on_remote_status(&report);
    }
    Ok(())
}

fn on_set_dnd(shared: &Arc<Shared>, enable: bool, tasks: &mut TaskSet) {
    let Some(device) = shared.collab.device.clone() else {
        debug!(enable, "DND requested but no device status configured");
        return;
    };
    if let Err(e) = device.set_dnd(enable) {
        shared.report_error(&format!("Cannot change DND: {e}"));
    }
    let shared = shared.clone();
    let delay = shared.config.dnd_status_delay();
    tasks.spawn("dnd-status", async move {
        tokio::time::sleep(delay).await;
        let sent = match device.snapshot().into_frame() {
            Ok(frame) => shared.send(frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!("status after DND not sent: {e}");
        }
    });
}
