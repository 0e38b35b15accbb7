//! Shared fixtures: in-memory transports, a raw codec peer and recording
//! collaborators.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tether_core::{
    Acceptor, AppCatalog, AppEntry, Artifact, ArtifactHandler, BoxedStream, Collaborators,
    Connector, DeviceStatus, Frame, LinkCodec, LinkConfig, LinkObserver, MessageType,
    NotificationPresenter, NotificationRecord, NotificationSource, PeerInfo, PeerListener,
    PowerControl, StatusReport, TelemetryObserver, TetherError, TransferDirection,
};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};

pub const WAIT: Duration = Duration::from_secs(120);
const PIPE_CAPACITY: usize = 256 * 1024;

pub fn test_config(artifact_dir: &Path) -> LinkConfig {
    LinkConfig {
        status_interval_ms: 0,
        artifact_dir: artifact_dir.to_path_buf(),
        ..Default::default()
    }
}

// ── Observer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(String),
    Connected(String),
    Disconnected,
    Error(String),
    Candidates(Vec<PeerInfo>),
    AppList(String),
    Progress(TransferDirection, i32),
}

pub struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl Recorder {
    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl LinkObserver for Recorder {
    fn on_status_changed(&self, status: &str) {
        self.emit(Event::Status(status.to_string()));
    }
    fn on_device_connected(&self, peer_name: &str) {
        self.emit(Event::Connected(peer_name.to_string()));
    }
    fn on_device_disconnected(&self) {
        self.emit(Event::Disconnected);
    }
    fn on_error(&self, message: &str) {
        self.emit(Event::Error(message.to_string()));
    }
    fn on_candidates(&self, peers: &[PeerInfo]) {
        self.emit(Event::Candidates(peers.to_vec()));
    }
    fn on_app_list(&self, apps_json: &str) {
        self.emit(Event::AppList(apps_json.to_string()));
    }
    fn on_transfer_progress(&self, direction: TransferDirection, progress: i32) {
        self.emit(Event::Progress(direction, progress));
    }
}

pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    pub async fn next(&mut self) -> Event {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("observer dropped")
    }

    /// Skip events until one matches; returns it and everything skipped.
    pub async fn wait_for(&mut self, pred: impl Fn(&Event) -> bool) -> (Event, Vec<Event>) {
        let mut skipped = Vec::new();
        loop {
            let event = self.next().await;
            if pred(&event) {
                return (event, skipped);
            }
            skipped.push(event);
        }
    }

    pub async fn connected(&mut self) -> String {
        match self.wait_for(|e| matches!(e, Event::Connected(_))).await.0 {
            Event::Connected(name) => name,
            _ => unreachable!(),
        }
    }

    pub async fn disconnected(&mut self) {
        self.wait_for(|e| *e == Event::Disconnected).await;
    }

    /// Everything already queued.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn observer() -> (Arc<Recorder>, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { tx }), Events { rx })
}

pub fn progress_of(events: &[Event], direction: TransferDirection) -> Vec<i32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(d, p) if *d == direction => Some(*p),
            _ => None,
        })
        .collect()
}

// ── Transports ───────────────────────────────────────────────────

/// Dials in-memory pipes; the far end of each successful dial is handed to
/// the test through a channel.
pub struct PipeConnector {
    candidates: Vec<PeerInfo>,
    unreachable: Mutex<HashSet<String>>,
    fail_next: AtomicUsize,
    attempts: Mutex<Vec<(String, Instant)>>,
    remotes: mpsc::UnboundedSender<(PeerInfo, DuplexStream)>,
}

impl PipeConnector {
    pub fn new(candidates: Vec<PeerInfo>) -> (Arc<Self>, mpsc::UnboundedReceiver<(PeerInfo, DuplexStream)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            candidates,
            unreachable: Mutex::new(HashSet::new()),
            fail_next: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            remotes: tx,
        };
        (Arc::new(connector), rx)
    }

    pub fn set_unreachable(&self, address: &str) {
        self.unreachable.lock().unwrap().insert(address.to_string());
    }

    /// Make the next `n` dials fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<(String, Instant)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for PipeConnector {
    async fn candidates(&self) -> Vec<PeerInfo> {
        self.candidates.clone()
    }

    async fn connect(&self, peer: &PeerInfo) -> io::Result<BoxedStream> {
        self.attempts
            .lock()
            .unwrap()
            .push((peer.address.clone(), Instant::now()));
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing || self.unreachable.lock().unwrap().contains(&peer.address) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "unreachable"));
        }
        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        let _ = self.remotes.send((peer.clone(), remote));
        Ok(Box::new(local))
    }

    fn resolve(&self, address: &str) -> PeerInfo {
        self.candidates
            .iter()
            .find(|p| p.address == address)
            .cloned()
            .unwrap_or_else(|| PeerInfo::from_address(address))
    }
}

/// Accepts streams pushed by a [`PipeDialer`].
pub struct PipeAcceptor {
    incoming: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DuplexStream>>>,
    listens: AtomicUsize,
}

#[derive(Clone)]
pub struct PipeDialer {
    tx: mpsc::UnboundedSender<DuplexStream>,
}

impl PipeDialer {
    /// Connect to the acceptor; returns the dialer's end.
    pub fn dial(&self) -> DuplexStream {
        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        self.tx.send(remote).expect("acceptor dropped");
        local
    }
}

impl PipeAcceptor {
    pub fn new() -> (Arc<Self>, PipeDialer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let acceptor = Self {
            incoming: Arc::new(tokio::sync::Mutex::new(rx)),
            listens: AtomicUsize::new(0),
        };
        (Arc::new(acceptor), PipeDialer { tx })
    }

    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }
}

struct PipeListener {
    incoming: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DuplexStream>>>,
}

#[async_trait]
impl Acceptor for PipeAcceptor {
    async fn listen(&self) -> io::Result<Box<dyn PeerListener>> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(PipeListener {
            incoming: self.incoming.clone(),
        }))
    }
}

#[async_trait]
impl PeerListener for PipeListener {
    async fn accept(&mut self) -> io::Result<(BoxedStream, PeerInfo)> {
        let stream = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "dialer gone"))?;
        Ok((Box::new(stream), PeerInfo::new("pipe", "hub")))
    }
}

// ── Raw peer ─────────────────────────────────────────────────────

/// The far end of a link, driven frame by frame.
pub struct RawPeer {
    reader: FramedRead<ReadHalf<DuplexStream>, LinkCodec>,
    writer: FramedWrite<WriteHalf<DuplexStream>, LinkCodec>,
}

impl RawPeer {
    pub fn new(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FramedRead::new(read, LinkCodec::new()),
            writer: FramedWrite::new(write, LinkCodec::new()),
        }
    }

    pub async fn send(&mut self, frame: Frame) {
        self.writer.send(frame).await.expect("raw send");
    }

    pub async fn send_text(&mut self, kind: MessageType, text: &str) {
        self.send(Frame::text(kind, text).unwrap()).await;
    }

    /// Write bytes past the codec.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.get_mut().write_all(bytes).await.expect("raw write");
    }

    /// Next frame, `None` at end of stream.
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::time::timeout(WAIT, self.reader.next())
            .await
            .expect("timed out waiting for a frame")
            .map(|r| r.expect("decode"))
    }

    /// Next frame that is not a heartbeat.
    pub async fn recv_data(&mut self) -> Frame {
        loop {
            let frame = self.recv().await.expect("stream closed");
            if frame.kind() != MessageType::Heartbeat {
                return frame;
            }
        }
    }

    /// Drain frames until the engine closes the stream.
    pub async fn expect_closed(&mut self) {
        while self.recv().await.is_some() {}
    }
}

// ── Collaborators ────────────────────────────────────────────────

#[derive(Default)]
pub struct Presenter {
    pub rendered: Mutex<Vec<(u32, NotificationRecord)>>,
    pub withdrawn: Mutex<Vec<u32>>,
}

impl NotificationPresenter for Presenter {
    fn render(&self, handle: u32, record: &NotificationRecord) -> Result<(), TetherError> {
        self.rendered.lock().unwrap().push((handle, record.clone()));
        Ok(())
    }

    fn withdraw(&self, handle: u32) {
        self.withdrawn.lock().unwrap().push(handle);
    }
}

#[derive(Default)]
pub struct Source {
    pub cancelled: Mutex<Vec<String>>,
}

impl NotificationSource for Source {
    fn cancel(&self, key: &str) {
        self.cancelled.lock().unwrap().push(key.to_string());
    }
}

pub struct Artifacts {
    tx: mpsc::UnboundedSender<Artifact>,
}

impl Artifacts {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Artifact>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl ArtifactHandler for Artifacts {
    async fn artifact_ready(&self, artifact: Artifact) -> Result<(), TetherError> {
        let _ = self.tx.send(artifact);
        Ok(())
    }
}

pub struct Power {
    pub calls: AtomicUsize,
    pub hang: bool,
}

impl Power {
    pub fn new(hang: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            hang,
        })
    }
}

#[async_trait]
impl PowerControl for Power {
    async fn shutdown(&self) -> Result<(), TetherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Device {
    pub dnd: AtomicBool,
    pub set_calls: Mutex<Vec<bool>>,
}

impl DeviceStatus for Device {
    fn snapshot(&self) -> StatusReport {
        StatusReport {
            battery: 77,
            charging: false,
            dnd: self.dnd.load(Ordering::SeqCst),
            wifi: "lab".into(),
        }
    }

    fn set_dnd(&self, enable: bool) -> Result<(), TetherError> {
        self.set_calls.lock().unwrap().push(enable);
        self.dnd.store(enable, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Apps(pub Vec<AppEntry>);

impl AppCatalog for Apps {
    fn installed_apps(&self) -> Vec<AppEntry> {
        self.0.clone()
    }
}

pub struct Telemetry {
    tx: mpsc::UnboundedSender<StatusReport>,
}

impl Telemetry {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StatusReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl TelemetryObserver for Telemetry {
    fn on_remote_status(&self, status: &StatusReport) {
        let _ = self.tx.send(status.clone());
    }
}

// ── Misc ─────────────────────────────────────────────────────────

/// Poll `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

pub fn collaborators(observer: Arc<Recorder>) -> Collaborators {
    Collaborators::new(observer)
}
