//! One established connection, from attach to teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Shared, dispatch};
use crate::collab::DeviceStatus;
use crate::heartbeat::Heartbeat;
use crate::network::{BoxedStream, PeerInfo};
use crate::state::Role;
use crate::task::TaskSet;

/// Why the dispatch loop stopped.
#[derive(Debug)]
pub(super) enum SessionEnd {
    /// The connection token fired (stop, dead link, write failure).
    Cancelled,
    /// The peer closed the stream cleanly.
    Closed,
    /// Transport or framing error.
    Failed(crate::error::TetherError),
}

/// Run a session to completion. Teardown happens here and only here, so
/// `on_device_disconnected` fires exactly once per session.
pub(super) async fn run(
    shared: &Arc<Shared>,
    stream: BoxedStream,
    peer: &PeerInfo,
    lifecycle: &CancellationToken,
) {
    let conn = lifecycle.child_token();
    let reader = shared.sender.attach(stream).await;
    enter_connected(shared, peer, &conn);

    let mut tasks = TaskSet::new(conn.clone());
    {
        let shared = shared.clone();
        let token = conn.clone();
        let heartbeat = Heartbeat::from_config(&shared.config);
        tasks.spawn("heartbeat", async move {
            heartbeat.run(&shared.state, &shared.sender, &token).await;
        });
    }
    if shared.state().role == Role::Responder {
        if let (Some(every), Some(device)) =
            (shared.config.status_interval(), shared.collab.device.clone())
        {
            tasks.spawn("status", status_loop(shared.clone(), device, every));
        }
    }

    let end = dispatch::run(shared, reader, &mut tasks).await;

    conn.cancel();
    tasks.shutdown().await;
    shared.sender.detach().await;
    shared.inbound.lock().await.discard().await;
    leave_connected(shared, lifecycle.is_cancelled(), end);
}

fn enter_connected(shared: &Shared, peer: &PeerInfo, conn: &CancellationToken) {
    let session = {
        let mut state = shared.state();
        if let Err(e) = state.phase.begin_connect() {
            warn!("unexpected phase on connect: {e}");
        }
        if let Err(e) = state.phase.complete_connect() {
            warn!("unexpected phase on connect: {e}");
        }
        state.peer_name = Some(peer.name.clone());
        state.transferring = false;
        state.last_chunk_at = None;
        state.touch();
        state.session += 1;
        state.session
    };
    shared.set_connection(Some(conn.clone()));
    info!(%peer, session, "link up");
    shared.set_status(format!("Connected to {}", peer.name));
    shared.collab.observer.on_device_connected(&peer.name);
}

fn leave_connected(shared: &Shared, stopping: bool, end: SessionEnd) {
    shared.set_connection(None);
    let (was_connected, uptime, session) = {
        let mut state = shared.state();
        let was_connected = state.phase.is_connected();
        let uptime = state.phase.connected_duration().unwrap_or_default();
        if was_connected {
            let _ = state.phase.connection_lost();
        }
        if stopping {
            let _ = state.phase.give_up();
        }
        state.peer_name = None;
        state.transferring = false;
        state.last_chunk_at = None;
        (was_connected, uptime, state.session)
    };

    let up_secs = uptime.as_secs();
    match &end {
        SessionEnd::Cancelled => info!(session, up_secs, "link closed locally"),
        SessionEnd::Closed => info!(session, up_secs, "peer closed the link"),
        SessionEnd::Failed(e) => warn!(session, up_secs, "link failed: {e}"),
    }
    if was_connected {
        shared.collab.observer.on_device_disconnected();
    }
    shared.set_status("Disconnected");
}

/// Push local device status to the peer at a fixed cadence.
async fn status_loop(shared: Arc<Shared>, device: Arc<dyn DeviceStatus>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let report = device.snapshot();
        let frame = match report.into_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("cannot encode status: {e}");
                continue;
            }
        };
        if let Err(e) = shared.send(frame).await {
            debug!("status update not sent: {e}");
            if e.is_fatal_to_link() {
                return;
            }
        }
    }
}
