//! Outbound connection to a peer node.

use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameReader};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::trace;

/// Initial capacity of the request encoding buffer.
const REQUEST_BUFFER_SIZE: usize = 1024;

/// A protocol connection to another node.
///
/// Requests are strictly request/reply: one frame out, one frame back.
#[derive(Debug)]
pub struct PeerClient {
    peer: String,
    reader: FrameReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    buffer: BytesMut,
}

impl PeerClient {
    /// Dial `peer` and mark the connection as a peer link.
    ///
    /// Commands sent over a peer link always run on the receiving node.
    pub async fn connect(peer: &str) -> Result<Self> {
        let stream = TcpStream::connect(peer).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();

        let mut client = Self {
            peer: peer.to_string(),
            reader: FrameReader::new(read),
            writer: BufWriter::new(write),
            buffer: BytesMut::with_capacity(REQUEST_BUFFER_SIZE),
        };

        match client.call([Bytes::from_static(b"PEERLINK")]).await? {
            Frame::Simple(s) if s == "OK" => Ok(client),
            other => Err(Error::Internal(format!(
                "peer {peer} refused link: {other:?}"
            ))),
        }
    }

    /// Address of the peer.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one command and wait for its reply.
    pub async fn call<I>(&mut self, args: I) -> Result<Frame>
    where
        I: IntoIterator<Item = Bytes>,
    {
        self.send(&Frame::command(args)).await
    }

    /// Send a request frame and wait for its reply.
    ///
    /// A reply that cannot be decoded poisons the connection; the error is
    /// returned and the caller should drop the client.
    pub async fn send(&mut self, request: &Frame) -> Result<Frame> {
        self.buffer.clear();
        request.serialize(&mut self.buffer);
        self.writer.write_all(&self.buffer).await?;
        self.writer.flush().await?;
        trace!(peer = %self.peer, bytes = self.buffer.len(), "request sent");

        match self.reader.next_frame().await {
            Some(result) => result,
            None => Err(Error::EndOfStream),
        }
    }

    /// Liveness check: PING must answer exactly `+PONG`.
    pub async fn ping(&mut self) -> bool {
        matches!(
            self.call([Bytes::from_static(b"PING")]).await,
            Ok(Frame::Simple(ref s)) if s == "PONG"
        )
    }
}
