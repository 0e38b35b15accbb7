//! Connection lifecycle: scan, remembered peer, reconnect, stop, responder
//! relisten.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tether_core::{ConnectionPhase, LinkEngine, MemoryPeerStore, PeerInfo, PeerStore};

fn peers(names: &[&str]) -> Vec<PeerInfo> {
    names.iter().map(|n| PeerInfo::new(*n, format!("{n}-name"))).collect()
}

// ── Scan ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scan_without_reachable_peers_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (connector, _remotes) = PipeConnector::new(peers(&["a", "b"]));
    connector.set_unreachable("a");
    connector.set_unreachable("b");

    let engine = LinkEngine::initiator(test_config(dir.path()), collaborators(recorder), connector.clone())
        .unwrap();
    engine.start();

    let (event, skipped) = events.wait_for(|e| matches!(e, Event::Error(_))).await;
    assert_eq!(event, Event::Error("No peer found".into()));
    assert!(skipped.contains(&Event::Status("Scanning...".into())));
    assert!(skipped.contains(&Event::Status("No peer found".into())));
    eventually(|| engine.phase() == ConnectionPhase::Disconnected).await;
    assert_eq!(connector.attempts().len(), 2);
}

#[tokio::test]
async fn scan_with_one_reachable_peer_connects_and_remembers_it() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let store = Arc::new(MemoryPeerStore::default());
    let (connector, mut remotes) = PipeConnector::new(peers(&["a", "b"]));
    connector.set_unreachable("a");

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(store.clone()),
        connector.clone(),
    )
    .unwrap();
    engine.start();

    assert_eq!(events.connected().await, "b-name");
    assert!(engine.is_connected());
    assert_eq!(engine.peer_name().as_deref(), Some("b-name"));
    assert_eq!(store.load().as_deref(), Some("b"));
    assert_eq!(engine.status(), "Connected to b-name");

    let (peer, _stream) = remotes.recv().await.unwrap();
    assert_eq!(peer.address, "b");
    engine.stop().await;
}

#[tokio::test]
async fn scan_with_several_peers_waits_for_a_choice() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let store = Arc::new(MemoryPeerStore::default());
    let (connector, mut remotes) = PipeConnector::new(peers(&["a", "b", "c"]));
    connector.set_unreachable("c");

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(store.clone()),
        connector.clone(),
    )
    .unwrap();
    engine.start();

    let (event, skipped) = events
        .wait_for(|e| matches!(e, Event::Candidates(_)))
        .await;
    let Event::Candidates(found) = event else {
        unreachable!()
    };
    let mut addresses: Vec<_> = found.iter().map(|p| p.address.clone()).collect();
    addresses.sort();
    assert_eq!(addresses, vec!["a", "b"]);
    assert!(!skipped.iter().any(|e| matches!(e, Event::Connected(_))));
    assert_eq!(store.load(), None);
    eventually(|| engine.phase() == ConnectionPhase::Disconnected).await;

    // The probe streams were closed again.
    for _ in 0..2 {
        let (_, stream) = remotes.recv().await.unwrap();
        RawPeer::new(stream).expect_closed().await;
    }

    let chosen = found.into_iter().find(|p| p.address == "b").unwrap();
    engine.connect_to(chosen).unwrap();
    assert_eq!(events.connected().await, "b-name");
    assert_eq!(store.load().as_deref(), Some("b"));
    engine.stop().await;
}

#[tokio::test]
async fn remembered_peer_is_dialed_directly() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let store = Arc::new(MemoryPeerStore::with_peer("b"));
    let (connector, _remotes) = PipeConnector::new(peers(&["a", "b"]));

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(store),
        connector.clone(),
    )
    .unwrap();
    engine.start();

    assert_eq!(events.connected().await, "b-name");
    let attempts: Vec<_> = connector.attempts().into_iter().map(|(a, _)| a).collect();
    assert_eq!(attempts, vec!["b"]);
    engine.stop().await;
}

#[tokio::test]
async fn responder_cannot_scan() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, _events) = observer();
    let (acceptor, _dialer) = PipeAcceptor::new();
    let engine =
        LinkEngine::responder(test_config(dir.path()), collaborators(recorder), acceptor).unwrap();
    assert!(engine.scan().is_err());
    assert!(engine.connect_to(PeerInfo::from_address("x")).is_err());
}

// ── Reconnect ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_dials_are_retried_after_connect_delay() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (connector, _remotes) = PipeConnector::new(peers(&["a"]));
    connector.fail_next(2);

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(Arc::new(MemoryPeerStore::with_peer("a"))),
        connector.clone(),
    )
    .unwrap();
    engine.start();

    let (_, skipped) = events.wait_for(|e| matches!(e, Event::Connected(_))).await;
    assert!(skipped.contains(&Event::Status("Trying to connect...".into())));

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= Duration::from_secs(5));
    }
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn lost_session_is_redialed_after_reconnect_delay() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (connector, mut remotes) = PipeConnector::new(peers(&["a"]));

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(Arc::new(MemoryPeerStore::with_peer("a"))),
        connector.clone(),
    )
    .unwrap();
    engine.start();
    events.connected().await;

    let (_, stream) = remotes.recv().await.unwrap();
    let lost_at = tokio::time::Instant::now();
    drop(stream);

    events.disconnected().await;
    let (_, skipped) = events.wait_for(|e| matches!(e, Event::Connected(_))).await;
    assert!(skipped.contains(&Event::Status("Reconnecting...".into())));

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1].1 - lost_at >= Duration::from_secs(3));
    engine.stop().await;
}

// ── Stop / forget ────────────────────────────────────────────────

#[tokio::test]
async fn stop_closes_stream_and_never_retries() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (connector, mut remotes) = PipeConnector::new(peers(&["a"]));

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(Arc::new(MemoryPeerStore::with_peer("a"))),
        connector.clone(),
    )
    .unwrap();
    engine.start();
    events.connected().await;
    let (_, stream) = remotes.recv().await.unwrap();
    let mut remote = RawPeer::new(stream);

    engine.stop().await;
    assert_eq!(engine.phase(), ConnectionPhase::Stopped);
    assert_eq!(engine.status(), "Stopped");
    remote.expect_closed().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let disconnects = events
        .drain()
        .into_iter()
        .filter(|e| *e == Event::Disconnected)
        .count();
    assert_eq!(disconnects, 1);
    assert_eq!(connector.attempts().len(), 1);

    // An explicit restart leaves Stopped.
    engine.start();
    events.connected().await;
    engine.stop().await;
}

#[tokio::test]
async fn forget_peer_clears_store_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let store = Arc::new(MemoryPeerStore::with_peer("a"));
    let (connector, _remotes) = PipeConnector::new(peers(&["a"]));

    let engine = LinkEngine::initiator(
        test_config(dir.path()),
        collaborators(recorder).with_peer_store(store.clone()),
        connector,
    )
    .unwrap();
    engine.start();
    events.connected().await;

    engine.forget_peer().await.unwrap();
    assert_eq!(store.load(), None);
    assert!(engine.phase().is_stopped());
}

// ── Responder ────────────────────────────────────────────────────

#[tokio::test]
async fn responder_listens_again_after_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (acceptor, dialer) = PipeAcceptor::new();

    let engine =
        LinkEngine::responder(test_config(dir.path()), collaborators(recorder), acceptor.clone())
            .unwrap();
    engine.start();
    events
        .wait_for(|e| *e == Event::Status("Waiting for connection...".into()))
        .await;

    let first = dialer.dial();
    assert_eq!(events.connected().await, "hub");
    assert_eq!(acceptor.listens(), 1);

    drop(first);
    events.disconnected().await;
    events
        .wait_for(|e| *e == Event::Status("Waiting for connection...".into()))
        .await;
    eventually(|| acceptor.listens() == 2).await;

    let _second = dialer.dial();
    events.connected().await;
    engine.stop().await;
    assert!(engine.phase().is_stopped());
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, mut events) = observer();
    let (acceptor, _dialer) = PipeAcceptor::new();

    let engine =
        LinkEngine::responder(test_config(dir.path()), collaborators(recorder), acceptor.clone())
            .unwrap();
    engine.start();
    events
        .wait_for(|e| *e == Event::Status("Waiting for connection...".into()))
        .await;
    engine.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(acceptor.listens(), 1);
    engine.stop().await;
}
