//! Chunked file transfer over the link.
//!
//! The outbound side pumps an `AsyncRead` through a [`TransferLane`]; the
//! inbound side is an [`InboundTransfer`] sink that the dispatch loop feeds
//! with `FileStart` / `FileChunk` / `FileEnd` frames.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::error::TetherError;
use crate::frame::Frame;
use crate::message::MessageType;
use crate::network::TransferLane;
use crate::protocol::file::progress_percent;
use crate::protocol::{Artifact, ProgressThrottle};

// ── Outbound ─────────────────────────────────────────────────────

/// Fill `buf` from `source`, stopping early only at end of stream.
async fn read_chunk<R>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Send `FileStart`, the chunks of `source` and `FileEnd` through `lane`.
///
/// `report` receives throttled in-flight percentages (never 100);
/// `on_chunk` fires after every chunk written. Errors reading `source` come
/// back as a collaborator error; errors writing the link are transport
/// errors.
pub async fn send_stream<R>(
    lane: &TransferLane,
    mut source: R,
    size: i64,
    chunk_size: usize,
    progress_interval: Duration,
    mut report: impl FnMut(i32),
    mut on_chunk: impl FnMut(),
) -> Result<u64, TetherError>
where
    R: AsyncRead + Unpin,
{
    lane.send(Frame::file_start(size)).await?;

    let mut throttle = ProgressThrottle::new(progress_interval);
    throttle.ready();

    let mut buf = vec![0u8; chunk_size];
    let mut sent: u64 = 0;
    loop {
        let n = read_chunk(&mut source, &mut buf)
            .await
            .map_err(|e| TetherError::collaborator("transfer source", e))?;
        if n == 0 {
            break;
        }
        lane.send(Frame::new(
            MessageType::FileChunk,
            Bytes::copy_from_slice(&buf[..n]),
        )?)
        .await?;
        sent += n as u64;
        on_chunk();
        if throttle.ready() {
            report(progress_percent(sent, size));
        }
        if n < chunk_size {
            break;
        }
    }

    lane.send(Frame::file_end()).await?;
    debug!(sent, "outbound transfer complete");
    Ok(sent)
}

// ── Inbound ──────────────────────────────────────────────────────

struct ReceiveSession {
    file: BufWriter<File>,
    expected: i64,
    received: u64,
    hasher: blake3::Hasher,
    throttle: ProgressThrottle,
}

/// Receive sink for the single inbound artifact location.
pub struct InboundTransfer {
    path: PathBuf,
    progress_interval: Duration,
    session: Option<ReceiveSession>,
}

impl InboundTransfer {
    pub fn new(path: impl Into<PathBuf>, progress_interval: Duration) -> Self {
        Self {
            path: path.into(),
            progress_interval,
            session: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn received(&self) -> u64 {
        self.session.as_ref().map(|s| s.received).unwrap_or(0)
    }

    /// Open (truncate) the artifact file for a new transfer. A transfer
    /// already in progress is discarded.
    pub async fn start(&mut self, expected: i64) -> Result<(), TetherError> {
        if self.session.is_some() {
            warn!("FileStart during an open transfer, restarting");
            self.session = None;
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(&self.path).await?;
        let mut throttle = ProgressThrottle::new(self.progress_interval);
        throttle.ready();
        self.session = Some(ReceiveSession {
            file: BufWriter::new(file),
            expected,
            received: 0,
            hasher: blake3::Hasher::new(),
            throttle,
        });
        info!(path = %self.path.display(), expected, "receiving file");
        Ok(())
    }

    /// Append a chunk. Returns a progress percentage when one is due.
    pub async fn chunk(&mut self, data: &[u8]) -> Result<Option<i32>, TetherError> {
        let session = self
            .session
            .as_mut()
            .ok_or(TetherError::ProtocolViolation("FileChunk without FileStart"))?;
        session.file.write_all(data).await?;
        session.hasher.update(data);
        session.received += data.len() as u64;
        if session.throttle.ready() {
            Ok(Some(progress_percent(session.received, session.expected)))
        } else {
            Ok(None)
        }
    }

    /// Close the artifact. `Ok(None)` when no transfer was open.
    pub async fn finish(&mut self) -> Result<Option<Artifact>, TetherError> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };
        if let Err(e) = session.file.flush().await {
            drop(session);
            let _ = tokio::fs::remove_file(&self.path).await;
            return Err(e.into());
        }
        let artifact = Artifact {
            path: self.path.clone(),
            size: session.received,
            expected_size: session.expected,
            digest: *session.hasher.finalize().as_bytes(),
        };
        if !artifact.is_complete() {
            warn!(
                expected = artifact.expected_size,
                received = artifact.size,
                "artifact size differs from announced size"
            );
        }
        info!(size = artifact.size, digest = %artifact.digest_hex(), "file received");
        Ok(Some(artifact))
    }

    /// Drop any open transfer and delete the partial file.
    pub async fn discard(&mut self) {
        if self.session.take().is_some() {
            if let Err(e) = tokio::fs::remove_file(&self.path).await {
                debug!("removing partial artifact: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::LinkSender;
    use futures::StreamExt;

    #[tokio::test]
    async fn inbound_writes_and_digests() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = InboundTransfer::new(dir.path().join("in.pkg"), Duration::from_millis(300));

        sink.start(6).await.unwrap();
        assert!(sink.is_open());
        sink.chunk(b"abc").await.unwrap();
        sink.chunk(b"def").await.unwrap();
        assert_eq!(sink.received(), 6);

        let artifact = sink.finish().await.unwrap().unwrap();
        assert!(!sink.is_open());
        assert_eq!(artifact.size, 6);
        assert!(artifact.is_complete());
        assert_eq!(artifact.digest, *blake3::hash(b"abcdef").as_bytes());
        assert_eq!(tokio::fs::read(&artifact.path).await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn chunk_without_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = InboundTransfer::new(dir.path().join("in.pkg"), Duration::from_millis(300));
        assert!(matches!(
            sink.chunk(b"x").await,
            Err(TetherError::ProtocolViolation(_))
        ));
        assert!(sink.finish().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restart_truncates_previous_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = InboundTransfer::new(dir.path().join("in.pkg"), Duration::from_millis(300));
        sink.start(-1).await.unwrap();
        sink.chunk(b"stale data").await.unwrap();
        sink.start(-1).await.unwrap();
        sink.chunk(b"new").await.unwrap();
        let artifact = sink.finish().await.unwrap().unwrap();
        assert_eq!(tokio::fs::read(&artifact.path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn discard_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.pkg");
        let mut sink = InboundTransfer::new(&path, Duration::from_millis(300));
        sink.start(100).await.unwrap();
        sink.chunk(b"partial").await.unwrap();
        sink.discard().await;
        assert!(!sink.is_open());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn outbound_chunks_exactly() {
        let (local, remote) = tokio::io::duplex(1024 * 1024);
        let sender = LinkSender::new();
        let _reader = sender.attach(Box::new(local)).await;
        let peer = LinkSender::new();
        let mut remote_reader = peer.attach(Box::new(remote)).await;

        let data = vec![7u8; 20_000];
        let lane = sender.try_begin_transfer().unwrap();
        let mut chunks = 0;
        let sent = send_stream(
            &lane,
            &data[..],
            data.len() as i64,
            8192,
            Duration::from_millis(300),
            |_| {},
            || chunks += 1,
        )
        .await
        .unwrap();
        assert_eq!(sent, 20_000);
        assert_eq!(chunks, 3);

        let start = remote_reader.next().await.unwrap().unwrap();
        assert_eq!(start.file_start_size().unwrap(), 20_000);
        let mut sizes = Vec::new();
        loop {
            let frame = remote_reader.next().await.unwrap().unwrap();
            match frame.kind() {
                MessageType::FileChunk => sizes.push(frame.payload_len()),
                MessageType::FileEnd => break,
                other => panic!("unexpected {other}"),
            }
        }
        assert_eq!(sizes, vec![8192, 8192, 3616]);
    }
}
