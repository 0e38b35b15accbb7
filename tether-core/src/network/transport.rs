//! Transport seams: how the initiator dials and how the responder accepts.
//!
//! The engine only needs an ordered, reliable byte stream. The traits here
//! abstract the radio (or socket) so that tests can use in-memory pipes and
//! the binaries can use TCP.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Any bidirectional byte stream the link can run over.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> LinkStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedStream = Box<dyn LinkStream>;

/// A reachable peer: an opaque address plus a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerInfo {
    pub address: String,
    pub name: String,
}

impl PeerInfo {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// A peer known only by its address (e.g. the remembered peer).
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
        }
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.address {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

/// Dialing side of the transport.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Peers that could be dialed right now (the bonded-device list).
    async fn candidates(&self) -> Vec<PeerInfo>;

    /// Open a stream to `peer`.
    async fn connect(&self, peer: &PeerInfo) -> io::Result<BoxedStream>;

    /// Rebuild a peer from a remembered address.
    fn resolve(&self, address: &str) -> PeerInfo {
        PeerInfo::from_address(address)
    }
}

/// Listening side of the transport.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// Open the well-known service endpoint.
    async fn listen(&self) -> io::Result<Box<dyn PeerListener>>;
}

/// An open listening endpoint.
#[async_trait]
pub trait PeerListener: Send {
    async fn accept(&mut self) -> io::Result<(BoxedStream, PeerInfo)>;
}

// ── TCP ──────────────────────────────────────────────────────────

/// Dials a fixed list of `host:port` candidates.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    candidates: Vec<PeerInfo>,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(candidates: Vec<PeerInfo>, connect_timeout: Duration) -> Self {
        Self {
            candidates,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn candidates(&self) -> Vec<PeerInfo> {
        self.candidates.clone()
    }

    async fn connect(&self, peer: &PeerInfo) -> io::Result<BoxedStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&peer.address))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        debug!(peer = %peer, "tcp stream open");
        Ok(Box::new(stream))
    }

    fn resolve(&self, address: &str) -> PeerInfo {
        self.candidates
            .iter()
            .find(|p| p.address == address)
            .cloned()
            .unwrap_or_else(|| PeerInfo::from_address(address))
    }
}

/// Binds a TCP listener on `bind_addr` each time the engine listens.
#[derive(Debug, Clone)]
pub struct TcpAcceptor {
    bind_addr: String,
}

impl TcpAcceptor {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
        }
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    async fn listen(&self) -> io::Result<Box<dyn PeerListener>> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        debug!(addr = %self.bind_addr, "listening");
        Ok(Box::new(TcpPeerListener { listener }))
    }
}

struct TcpPeerListener {
    listener: TcpListener,
}

#[async_trait]
impl PeerListener for TcpPeerListener {
    async fn accept(&mut self) -> io::Result<(BoxedStream, PeerInfo)> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((Box::new(stream), PeerInfo::from_address(addr.to_string())))
    }
}
