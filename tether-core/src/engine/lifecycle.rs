//! Role lifecycles: dial/scan/retry and listen/accept/retry.

use std::sync::Arc;

use futures::future::join_all;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Shared, Transport, session};
use crate::network::{Acceptor, BoxedStream, Connector, PeerInfo};
use crate::state::ConnectionPhase;
use crate::task::sleep_or_cancel;

/// How the initiator picks its peer.
pub(super) enum Entry {
    /// Remembered peer if any, otherwise scan.
    Auto,
    /// Always scan.
    Scan,
    /// A peer chosen by the user.
    Peer(PeerInfo),
}

pub(super) async fn run(shared: Arc<Shared>, token: CancellationToken, entry: Entry) {
    shared.state().phase.restart();
    match &shared.transport {
        Transport::Initiator(connector) => {
            let connector = connector.clone();
            run_initiator(&shared, connector.as_ref(), &token, entry).await;
        }
        Transport::Responder(acceptor) => {
            let acceptor = acceptor.clone();
            run_responder(&shared, acceptor.as_ref(), &token).await;
        }
    }
    debug!("lifecycle finished");
}

// ── Initiator ────────────────────────────────────────────────────

async fn run_initiator(
    shared: &Arc<Shared>,
    connector: &dyn Connector,
    token: &CancellationToken,
    entry: Entry,
) {
    let remembered = match &entry {
        Entry::Auto => shared.collab.peer_store.load(),
        _ => None,
    };

    let mut pending: Option<BoxedStream> = None;
    let peer = match (entry, remembered) {
        (Entry::Peer(peer), _) => peer,
        (Entry::Auto, Some(address)) => connector.resolve(&address),
        _ => match scan(shared, connector, token).await {
            Some((peer, stream)) => {
                pending = Some(stream);
                peer
            }
            None => return,
        },
    };

    let mut delay = None;
    loop {
        if let Some(delay) = delay.take() {
            if !sleep_or_cancel(delay, token).await {
                return;
            }
        }

        let stream = match pending.take() {
            Some(stream) => stream,
            None => {
                shared.advance(ConnectionPhase::begin_connect);
                shared.set_status(format!("Connecting to {}...", peer.name));
                let attempt = tokio::select! {
                    _ = token.cancelled() => return,
                    r = connector.connect(&peer) => r,
                };
                match attempt {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(%peer, "connect failed: {e}");
                        shared.advance(ConnectionPhase::connect_failed);
                        shared.set_status("Trying to connect...");
                        delay = Some(shared.config.connect_retry_delay());
                        continue;
                    }
                }
            }
        };

        session::run(shared, stream, &peer, token).await;
        if token.is_cancelled() {
            return;
        }
        shared.set_status("Reconnecting...");
        delay = Some(shared.config.reconnect_delay());
    }
}

/// Dial every candidate at once. Returns the stream only when exactly one
/// peer answered.
async fn scan(
    shared: &Shared,
    connector: &dyn Connector,
    token: &CancellationToken,
) -> Option<(PeerInfo, BoxedStream)> {
    shared.advance(ConnectionPhase::begin_connect);
    shared.set_status("Scanning...");

    let candidates = tokio::select! {
        _ = token.cancelled() => return None,
        c = connector.candidates() => c,
    };
    let attempts = candidates.into_iter().map(|peer| async move {
        let result = connector.connect(&peer).await;
        (peer, result)
    });
    let results = tokio::select! {
        _ = token.cancelled() => return None,
        r = join_all(attempts) => r,
    };

    let mut reachable: Vec<(PeerInfo, BoxedStream)> = results
        .into_iter()
        .filter_map(|(peer, result)| match result {
            Ok(stream) => Some((peer, stream)),
            Err(e) => {
                debug!(%peer, "candidate unreachable: {e}");
                None
            }
        })
        .collect();

    match reachable.len() {
        0 => {
            shared.advance(ConnectionPhase::give_up);
            shared.set_status("No peer found");
            shared.report_error("No peer found");
            None
        }
        1 => {
            let (peer, stream) = reachable.pop()?;
            if let Err(e) = shared.collab.peer_store.save(&peer.address) {
                warn!(%peer, "could not remember peer: {e}");
            }
            info!(%peer, "single peer found");
            Some((peer, stream))
        }
        n => {
            info!(count = n, "several peers answered, waiting for a choice");
            let peers: Vec<PeerInfo> = reachable.iter().map(|(p, _)| p.clone()).collect();
            for (_, mut stream) in reachable {
                let _ = stream.shutdown().await;
            }
            shared.advance(ConnectionPhase::give_up);
            shared.set_status("Disconnected");
            shared.collab.observer.on_candidates(&peers);
            None
        }
    }
}

// ── Responder ────────────────────────────────────────────────────

async fn run_responder(shared: &Arc<Shared>, acceptor: &dyn Acceptor, token: &CancellationToken) {
    let retry = shared.config.listen_retry_delay();
    let poll = shared.config.accept_poll();

    loop {
        shared.advance(ConnectionPhase::begin_connect);
        shared.set_status("Waiting for connection...");

        let listening = tokio::select! {
            _ = token.cancelled() => return,
            r = acceptor.listen() => r,
        };
        let mut listener = match listening {
            Ok(listener) => listener,
            Err(e) => {
                warn!("listen failed: {e}");
                shared.advance(ConnectionPhase::connect_failed);
                if !sleep_or_cancel(retry, token).await {
                    return;
                }
                continue;
            }
        };

        let accepted = loop {
            let polled = tokio::select! {
                _ = token.cancelled() => return,
                r = tokio::time::timeout(poll, listener.accept()) => r,
            };
            match polled {
                Err(_) => continue,
                Ok(result) => break result,
            }
        };
        // One peer at a time: stop listening while the session runs.
        drop(listener);

        match accepted {
            Ok((stream, peer)) => {
                session::run(shared, stream, &peer, token).await;
                if token.is_cancelled() {
                    return;
                }
            }
            Err(e) => {
                warn!("accept failed: {e}");
                shared.advance(ConnectionPhase::connect_failed);
                if !sleep_or_cancel(retry, token).await {
                    return;
                }
            }
        }
    }
}
