pub mod connection;
pub mod transport;

pub use connection::{FrameReader, LinkSender, TransferLane};
pub use transport::{
    Acceptor, BoxedStream, Connector, LinkStream, PeerInfo, PeerListener, TcpAcceptor,
    TcpConnector,
};
