//! Shared helpers for the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use ringstore::{Config, Frame, FrameReader, Result, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A server running in the background of a test.
pub struct TestServer {
    pub server: Arc<Server>,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Start a server on an ephemeral local port.
    pub async fn start(config: Config) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::start_on(listener, config).await
    }

    /// Start a server on a listener bound by the caller.
    pub async fn start_on(listener: TcpListener, config: Config) -> Self {
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(config).await.unwrap());
        let task = tokio::spawn(Arc::clone(&server).serve(listener));
        server.ready().await;
        Self { server, addr, task }
    }

    pub async fn client(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }

    /// Shut down and wait for the server to finish.
    pub async fn stop(self) {
        self.server.shutdown();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

/// A plain RESP client.
pub struct TestClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: FrameReader::new(read),
            writer,
        }
    }

    /// Send one command and read its reply.
    pub async fn cmd(&mut self, parts: &[&str]) -> Frame {
        let request = Frame::command(parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())));
        self.send_raw(&request.to_vec()).await;
        self.read().await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    pub async fn read(&mut self) -> Frame {
        tokio::time::timeout(Duration::from_secs(5), self.reader.next_frame())
            .await
            .expect("no reply")
            .expect("connection closed")
            .unwrap()
    }
}

pub fn bulk_array(items: &[&str]) -> Frame {
    Frame::array(
        items
            .iter()
            .map(|i| Frame::bulk(Bytes::copy_from_slice(i.as_bytes())))
            .collect(),
    )
}

pub fn local_config() -> Config {
    Config::default().bind("127.0.0.1").port(0)
}
