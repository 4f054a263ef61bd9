use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};
use crate::reply::Reply;

/// Redis refuses bulk strings larger than this, so there is no point buffering more for a frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Turns the raw bytes of a connection into [`Frame`]s and [`Reply`]s back into bytes.
///
/// A frame is only removed from the read buffer once it has been parsed in full, so bytes that
/// belong to the next command are never consumed early.
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = frame::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor, false) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => {
                // Check if the buffered frame exceeds the limit to prevent unbounded growth.
                if src.len() > self.max_frame_size {
                    return Err(frame::Error::FrameTooLarge {
                        size: src.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        // Nothing left over: the stream ended exactly on a frame boundary.
        if buf.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&buf[..]);
        let frame = Frame::parse(&mut cursor, true);
        buf.clear();

        match frame {
            Ok(frame) => Ok(Some(frame)),
            Err(frame::Error::Incomplete) => Err(frame::Error::Truncated),
            Err(err) => Err(err),
        }
    }
}

impl Encoder<Reply> for FrameCodec {
    type Error = frame::Error;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&reply.serialize());
        Ok(())
    }
}
