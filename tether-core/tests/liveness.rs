//! Heartbeat and dead-link detection against a silent or chatty peer.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tether_core::{
    Frame, LinkConfig, LinkEngine, MemoryPeerStore, MessageType, NotificationRecord, PeerInfo,
    TetherError, TransferDirection,
};
use tokio::time::Instant;

async fn connected_initiator(
    config: LinkConfig,
) -> (LinkEngine, Events, Arc<PipeConnector>, RawPeer) {
    let (recorder, mut events) = observer();
    let (connector, mut remotes) = PipeConnector::new(vec![PeerInfo::new("sat", "satellite")]);
    let engine = LinkEngine::initiator(
        config,
        collaborators(recorder).with_peer_store(Arc::new(MemoryPeerStore::with_peer("sat"))),
        connector.clone(),
    )
    .unwrap();
    engine.start();
    events.connected().await;
    let (_, stream) = remotes.recv().await.unwrap();
    (engine, events, connector, RawPeer::new(stream))
}

#[tokio::test(start_paused = true)]
async fn heartbeats_are_sent_every_interval() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _events, _connector, mut remote) = connected_initiator(test_config(dir.path())).await;
    let start = Instant::now();

    let first = remote.recv().await.unwrap();
    assert_eq!(first.kind(), MessageType::Heartbeat);
    assert_eq!(first.payload(), b"PING");
    assert_eq!(start.elapsed(), Duration::from_secs(20));

    remote.send(Frame::heartbeat()).await;
    let second = remote.recv().await.unwrap();
    assert_eq!(second.kind(), MessageType::Heartbeat);
    assert_eq!(start.elapsed(), Duration::from_secs(40));
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn silent_peer_is_torn_down_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut events, connector, _remote) =
        connected_initiator(test_config(dir.path())).await;
    let connected_at = Instant::now();

    events.disconnected().await;
    let silent_for = connected_at.elapsed();
    assert!(silent_for > Duration::from_secs(60));
    assert!(silent_for <= Duration::from_secs(80));

    engine.stop().await;
    let extra = events
        .drain()
        .into_iter()
        .filter(|e| *e == Event::Disconnected)
        .count();
    assert_eq!(extra, 0);
    // Stopped during the reconnect wait: no second dial.
    assert_eq!(connector.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn chatty_peer_keeps_the_link_up() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut events, _connector, remote) =
        connected_initiator(test_config(dir.path())).await;

    let pinger = tokio::spawn(async move {
        let mut remote = remote;
        loop {
            tokio::time::sleep(Duration::from_secs(15)).await;
            remote.send(Frame::heartbeat()).await;
            while let Ok(Some(_)) =
                tokio::time::timeout(Duration::from_millis(1), remote.recv()).await
            {}
        }
    });

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(engine.is_connected());
    assert!(!events.drain().contains(&Event::Disconnected));

    pinger.abort();
    engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn outbound_transfer_suspends_liveness() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut events, _connector, mut remote) =
        connected_initiator(test_config(dir.path())).await;

    // A source that never yields data keeps the transfer open.
    let (_source_writer, source) = tokio::io::duplex(64);
    let transfer = engine.send_file(source, -1).unwrap();
    assert_eq!(remote.recv_data().await.kind(), MessageType::FileStart);

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(engine.is_connected());
    assert!(engine.is_transferring());
    assert!(!events.drain().contains(&Event::Disconnected));

    engine.stop().await;
    assert!(transfer.await.unwrap().is_err());
}

#[tokio::test(start_paused = true)]
async fn liveness_can_run_during_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let config = LinkConfig {
        suspend_liveness_during_transfer: false,
        ..test_config(dir.path())
    };
    let (engine, mut events, _connector, _remote) = connected_initiator(config).await;

    let (_source_writer, source) = tokio::io::duplex(64);
    let _transfer = engine.send_file(source, -1).unwrap();

    let failed = Event::Progress(TransferDirection::Upload, -1);
    let (_, skipped) = events.wait_for(|e| *e == Event::Disconnected).await;
    if !skipped.contains(&failed) {
        events.wait_for(|e| *e == failed).await;
    }
    assert!(!engine.is_transferring());
    engine.stop().await;
}

/// Start a send larger than the pipe so it blocks on a peer that never reads.
fn stalled_send(engine: &LinkEngine) -> tokio::task::JoinHandle<Result<(), TetherError>> {
    let engine = engine.clone();
    let record = NotificationRecord::new("com.chat", "big", "Alice", "x".repeat(2_000_000));
    tokio::spawn(async move { engine.send_record(record).await })
}

#[tokio::test(start_paused = true)]
async fn stop_is_not_held_up_by_a_stalled_write() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, _events, _connector, _remote) =
        connected_initiator(test_config(dir.path())).await;

    let send = stalled_send(&engine);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!send.is_finished());

    tokio::time::timeout(Duration::from_secs(5), engine.stop())
        .await
        .expect("stop must not wait for the blocked write");
    assert!(engine.phase().is_stopped());
    assert!(send.await.unwrap().is_err());
}

#[tokio::test(start_paused = true)]
async fn stalled_peer_is_declared_dead() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mut events, _connector, _remote) =
        connected_initiator(test_config(dir.path())).await;
    let connected_at = Instant::now();

    let send = stalled_send(&engine);
    events.disconnected().await;
    assert!(connected_at.elapsed() <= Duration::from_secs(80));
    assert!(matches!(
        send.await.unwrap(),
        Err(TetherError::WriteStalled(_) | TetherError::NotConnected)
    ));

    engine.stop().await;
    let extra = events
        .drain()
        .into_iter()
        .filter(|e| *e == Event::Disconnected)
        .count();
    assert_eq!(extra, 0);
}
