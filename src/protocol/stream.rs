//! Frame decoding over an async byte source.

use super::{Frame, RespParser};
use crate::error::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Minimum free space kept in the read buffer before each read.
const READ_RESERVE: usize = 4096;

/// Decodes a stream of frames from an async reader.
///
/// Each call to [`next_frame`](Self::next_frame) yields one decoded frame or
/// one decode error. Protocol errors are per-unit: decoding carries on with
/// the next unit. End of stream and I/O failures are reported once, after
/// which the reader is exhausted and only returns `None`.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    parser: RespParser,
    finished: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: RespParser::new(),
            finished: false,
        }
    }

    /// Decode the next frame, reading more bytes as needed.
    ///
    /// Cancel safe: bytes already read stay buffered for the next call.
    pub async fn next_frame(&mut self) -> Option<Result<Frame>> {
        if self.finished {
            return None;
        }

        loop {
            match self.parser.parse() {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {}
                Err(e) => return Some(Err(Error::Protocol(e))),
            }

            let buffer = self.parser.buffer_mut();
            if buffer.capacity() - buffer.len() < READ_RESERVE {
                buffer.reserve(READ_RESERVE);
            }

            match self.reader.read_buf(buffer).await {
                Ok(0) => {
                    self.finished = true;
                    if !self.parser.is_empty() {
                        trace!(pending = self.parser.len(), "stream ended inside a frame");
                    }
                    return Some(Err(Error::EndOfStream));
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::Io(e)));
                }
            }
        }
    }

    /// Returns true once end of stream or an I/O error was reported.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
