//! Connection handling for individual clients.

use super::ClientState;
use crate::Result;
use crate::cluster::Dispatcher;
use crate::commands::ParsedCommand;
use crate::protocol::{Frame, RespParser};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Buffer size for reading from socket.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Maximum number of responses to batch before flushing.
const WRITE_BATCH_SIZE: usize = 64;

/// Maximum bytes to buffer before forcing a flush.
const WRITE_BUFFER_HIGH_WATER: usize = 64 * 1024;

/// A connection to a single client.
///
/// Commands are decoded and executed one at a time, in arrival order, and
/// their replies are written back in the same order. Replies to pipelined
/// requests are batched into one write.
pub struct Connection {
    /// TCP stream
    stream: BufWriter<TcpStream>,
    /// Peer address
    peer_addr: SocketAddr,
    /// RESP parser
    parser: RespParser,
    /// Client state
    state: Arc<ClientState>,
    /// Local executor or cluster router
    dispatcher: Dispatcher,
    /// Flips to true when the server stops taking input
    shutdown: watch::Receiver<bool>,
    /// Write buffer
    write_buffer: BytesMut,
    /// Number of replies queued but not yet flushed
    pending_writes: usize,
}

impl Connection {
    /// Create a new connection.
    pub fn new(
        stream: TcpStream,
        state: Arc<ClientState>,
        dispatcher: Dispatcher,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        debug!("New connection from {} (id={})", peer_addr, state.id());

        Ok(Self {
            stream: BufWriter::new(stream),
            peer_addr,
            parser: RespParser::new(),
            state,
            dispatcher,
            shutdown,
            write_buffer: BytesMut::with_capacity(4096),
            pending_writes: 0,
        })
    }

    /// Run the connection handler until the peer hangs up, an I/O error
    /// occurs or the server shuts down.
    pub async fn run(&mut self) -> Result<()> {
        let mut read_buf = vec![0u8; READ_BUFFER_SIZE];

        let result = self.serve(&mut read_buf).await;

        // Whatever is queued still goes out before the socket closes.
        let flushed = self.flush_writes().await;
        self.state.close();
        result.and(flushed)
    }

    async fn serve(&mut self, read_buf: &mut [u8]) -> Result<()> {
        loop {
            if self.state.is_closed() || *self.shutdown.borrow() {
                break;
            }

            let n = tokio::select! {
                n = self.stream.get_mut().read(read_buf) => n?,
                _ = self.shutdown.changed() => {
                    debug!("Shutdown, closing connection {}", self.peer_addr);
                    break;
                }
            };
            if n == 0 {
                debug!("Connection closed by peer: {}", self.peer_addr);
                break;
            }

            trace!("Read {} bytes from {}", n, self.peer_addr);
            self.parser.extend(&read_buf[..n]);

            loop {
                match self.parser.parse() {
                    Ok(Some(frame)) => {
                        self.handle_frame(frame).await;

                        if self.pending_writes >= WRITE_BATCH_SIZE
                            || self.write_buffer.len() >= WRITE_BUFFER_HIGH_WATER
                        {
                            self.flush_writes().await?;
                        }
                    }
                    Ok(None) => {
                        self.flush_writes().await?;
                        break;
                    }
                    Err(e) => {
                        // The parser has already skipped the bad unit.
                        debug!("Protocol error from {}: {}", self.peer_addr, e);
                        let error = Frame::error(crate::Error::from(e).to_reply_error());
                        self.queue_frame(&error);
                    }
                }
            }
        }

        Ok(())
    }

    /// Execute one decoded frame and queue its reply.
    async fn handle_frame(&mut self, frame: Frame) {
        trace!("Handling frame: {:?}", frame);

        let reply = match ParsedCommand::from_frame(frame) {
            Ok(cmd) => {
                trace!("Executing command: {}", cmd.name);
                self.dispatcher.dispatch(cmd, &self.state).await
            }
            Err(e) => Frame::error(e.to_reply_error()),
        };

        self.queue_frame(&reply);
    }

    /// Queue a frame for writing (batched).
    fn queue_frame(&mut self, frame: &Frame) {
        frame.serialize(&mut self.write_buffer);
        self.pending_writes += 1;
        self.state.begin_write();
    }

    /// Flush all pending writes to the socket.
    async fn flush_writes(&mut self) -> Result<()> {
        if self.pending_writes == 0 {
            return Ok(());
        }

        let result = async {
            self.stream.write_all(&self.write_buffer).await?;
            self.stream.flush().await
        }
        .await;

        self.write_buffer.clear();
        for _ in 0..std::mem::take(&mut self.pending_writes) {
            self.state.end_write();
        }
        Ok(result?)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state)
            .finish()
    }
}
