//! The single serialized write path of a link.
//!
//! Reads need no coordination: frames are self-delimiting and only the
//! dispatch loop reads. Writes come from many places (heartbeat, dispatch
//! replies, API calls, file transfers), so they all go through one
//! [`LinkSender`]:
//!
//! * the writer mutex keeps each frame's header and payload contiguous;
//! * the transfer gate keeps a file transfer's frames contiguous. Ordinary
//!   sends queue behind a running transfer, control frames do not.
//!
//! A write never outlives its stream: [`LinkSender::detach`] aborts writes
//! blocked on a peer that stopped reading, and an optional write timeout
//! turns such a stall into [`TetherError::WriteStalled`].

use std::fmt;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use futures::SinkExt;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::transport::BoxedStream;
use crate::codec::LinkCodec;
use crate::error::TetherError;
use crate::frame::Frame;

/// Frame stream produced by [`LinkSender::attach`].
pub type FrameReader = FramedRead<ReadHalf<BoxedStream>, LinkCodec>;
type FrameWriter = FramedWrite<WriteHalf<BoxedStream>, LinkCodec>;

/// Cloneable handle to the current connection's write half.
#[derive(Clone, Default)]
pub struct LinkSender {
    writer: Arc<Mutex<Option<FrameWriter>>>,
    gate: Arc<Mutex<()>>,
    /// Cancelled when the current stream is detached or replaced.
    closed: Arc<std::sync::Mutex<CancellationToken>>,
    write_timeout: Option<Duration>,
}

impl fmt::Debug for LinkSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSender")
            .field("gate_held", &self.gate.try_lock().is_err())
            .finish()
    }
}

impl LinkSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose single frame writes fail with
    /// [`TetherError::WriteStalled`] after `limit`.
    pub fn with_write_timeout(limit: Duration) -> Self {
        Self {
            write_timeout: Some(limit),
            ..Self::default()
        }
    }

    fn closed(&self) -> MutexGuard<'_, CancellationToken> {
        self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a fresh stream, replacing any previous writer, and return
    /// the read half for the dispatch loop.
    pub async fn attach(&self, stream: BoxedStream) -> FrameReader {
        let (read, write) = tokio::io::split(stream);
        std::mem::replace(&mut *self.closed(), CancellationToken::new()).cancel();
        *self.writer.lock().await = Some(FramedWrite::new(write, LinkCodec::new()));
        FramedRead::new(read, LinkCodec::new())
    }

    /// Abort pending writes and drop the writer. The underlying stream
    /// closes once the reader half is dropped too.
    pub async fn detach(&self) {
        self.closed().cancel();
        self.writer.lock().await.take();
    }

    pub async fn is_attached(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Send an ordinary frame. Waits for any running transfer to finish.
    pub async fn send(&self, frame: Frame) -> Result<(), TetherError> {
        let _gate = self.gate.lock().await;
        self.write(frame).await
    }

    /// Send a frame without waiting for the transfer gate. Used for
    /// heartbeats, which must never be blocked by ordinary traffic.
    pub async fn send_control(&self, frame: Frame) -> Result<(), TetherError> {
        self.write(frame).await
    }

    /// Claim the write side for a file transfer. Fails immediately if
    /// another transfer holds it.
    pub fn try_begin_transfer(&self) -> Result<TransferLane, TetherError> {
        let guard = self
            .gate
            .clone()
            .try_lock_owned()
            .map_err(|_| TetherError::TransferInProgress)?;
        Ok(TransferLane {
            sender: self.clone(),
            _gate: guard,
        })
    }

    async fn write(&self, frame: Frame) -> Result<(), TetherError> {
        let closed = self.closed().clone();
        let write = async {
            let mut writer = self.writer.lock().await;
            let writer = writer.as_mut().ok_or(TetherError::NotConnected)?;
            trace!(kind = %frame.kind(), len = frame.payload_len(), "send");
            writer.send(frame).await
        };
        let bounded = async {
            match self.write_timeout {
                Some(limit) => tokio::time::timeout(limit, write)
                    .await
                    .map_err(|_| TetherError::WriteStalled(limit))?,
                None => write.await,
            }
        };
        tokio::select! {
            _ = closed.cancelled() => Err(TetherError::NotConnected),
            result = bounded => result,
        }
    }
}

/// Exclusive write access for the duration of one file transfer.
pub struct TransferLane {
    sender: LinkSender,
    _gate: OwnedMutexGuard<()>,
}

impl TransferLane {
    pub async fn send(&self, frame: Frame) -> Result<(), TetherError> {
        self.sender.write(frame).await
    }
}

impl fmt::Debug for TransferLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferLane").finish_non_exhaustive()
    }
}
