//! # tether-core
//!
//! Link protocol engine for a hub/satellite device pair.
//!
//! This crate contains:
//! - **Wire types**: `MessageType`, `Frame` and the `LinkCodec` for
//!   `[type:1][len:4 BE][payload]` framing via `tokio_util`
//! - **Protocol payloads**: notifications, status telemetry, text commands,
//!   file transfer progress and artifacts
//! - **Network**: transport traits (`Connector`, `Acceptor`), a TCP
//!   implementation and the serialized `LinkSender`
//! - **State**: the `ConnectionPhase` state machine and shared `LinkState`
//! - **Engine**: `LinkEngine`, which runs the connection lifecycle,
//!   heartbeat, dispatch loop, transfers and notification relay
//! - **Collaborators**: traits for everything platform-specific
//! - **Error**: `TetherError`, a `thiserror`-based error hierarchy

pub mod codec;
pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod message;
pub mod network;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod task;
pub mod transfer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::LinkCodec;
pub use collab::{
    AppCatalog, ArtifactHandler, Collaborators, DeviceStatus, LinkObserver, MemoryPeerStore,
    NotificationPresenter, NotificationSource, PeerStore, PowerControl, TelemetryObserver,
};
pub use config::LinkConfig;
pub use engine::LinkEngine;
pub use error::{TaskError, TetherError};
pub use frame::{Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::MessageType;
pub use network::{
    Acceptor, BoxedStream, Connector, LinkSender, LinkStream, PeerInfo, PeerListener,
    TcpAcceptor, TcpConnector,
};
pub use protocol::{
    AppEntry, Artifact, MirrorPolicy, NotificationRecord, SourceNotification, StatusReport,
    TextCommand, TransferDirection,
};
pub use relay::NotificationRelay;
pub use state::{ConnectionPhase, LinkState, Role};
pub use task::TaskSet;
