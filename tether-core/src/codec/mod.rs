//! `tokio_util` codec for link frames.
//!
//! The decoder validates the type byte and the declared length before
//! reserving any buffer space for the payload, so a corrupt or hostile
//! header never triggers a large allocation.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TetherError;
use crate::frame::{Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::message::MessageType;

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkCodec {}

impl LinkCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for LinkCodec {
    type Item = Frame;
    type Error = TetherError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let kind = MessageType::try_from(src[0])?;
        let declared = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if declared > MAX_PAYLOAD_SIZE {
            return Err(TetherError::FrameTooLarge {
                size: declared,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < HEADER_SIZE + declared {
            src.reserve(HEADER_SIZE + declared - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(declared).freeze();
        Frame::new(kind, payload).map(Some)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(TetherError::TruncatedFrame {
                buffered: buf.len(),
            }),
        }
    }
}

impl Encoder<Frame> for LinkCodec {
    type Error = TetherError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.payload_len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(TetherError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.reserve(HEADER_SIZE + len);
        dst.put_u8(item.kind() as u8);
        dst.put_u32(len as u32);
        dst.extend_from_slice(item.payload());
        Ok(())
    }
}
