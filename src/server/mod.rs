//! Ringstore server implementation.
//!
//! This module provides the async TCP server, connection handling,
//! and configuration.

pub mod config;
mod connection;
mod state;

pub use config::{Config, ConfigError, LogLevel};
pub use connection::Connection;
pub use state::ClientState;

use crate::Result;
use crate::cluster::{ClusterRouter, Dispatcher};
use crate::commands::{CommandExecutor, CommandRegistry};
use crate::persistence::{self, AofTask};
use crate::storage::Database;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const MAX_CLIENTS_REPLY: &[u8] = b"-ERR max number of clients reached\r\n";

/// The main server.
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: Config,
    /// Database
    database: Arc<Database>,
    /// Where session commands go
    dispatcher: Dispatcher,
    /// AOF writer, taken at shutdown
    aof: Mutex<Option<AofTask>>,
    /// Running flag
    running: AtomicBool,
    /// Stop accepting connections
    stop: Arc<Notify>,
    /// Tells sessions to stop reading input
    shutdown: watch::Sender<bool>,
    /// Live sessions, for draining
    clients: DashMap<u64, Arc<ClientState>>,
    /// Connection counter
    connection_count: AtomicU64,
    /// Total connections
    total_connections: AtomicU64,
    /// Connection semaphore for backpressure (limits concurrent connections)
    connection_semaphore: Arc<Semaphore>,
    /// Address the listener is bound to, once running
    local_addr: Mutex<Option<SocketAddr>>,
    /// Signalled once the listener is bound
    ready: Notify,
}

impl Server {
    /// Create a new server with the given configuration.
    ///
    /// Replays the AOF before anything else so the keyspace is complete
    /// before the first client connects, then starts the AOF writer.
    pub async fn new(config: Config) -> Result<Self> {
        let database = Arc::new(Database::new(config.databases));
        let registry = Arc::new(CommandRegistry::new());
        let mut executor = CommandExecutor::new(Arc::clone(&registry), Arc::clone(&database));
        let mut aof = None;

        let aof_config = config.persistence();
        if aof_config.aof_enabled {
            let path = &aof_config.aof_path;
            let start = Instant::now();
            let stats = persistence::replay(path, &executor).await?;
            info!(
                "DB loaded from append only file: {:.3} seconds, {} commands ({} failed, {} skipped)",
                start.elapsed().as_secs_f64(),
                stats.commands,
                stats.failed,
                stats.skipped
            );

            let (handle, task) =
                persistence::start_writer(path, aof_config.aof_fsync, aof_config.aof_queue)
                    .await?;
            executor = executor.with_aof(handle);
            aof = Some(task);
        }

        let executor = Arc::new(executor);
        let dispatcher = match config.cluster_config() {
            Some(cluster) => {
                info!(
                    node = %cluster.self_id,
                    peers = cluster.peers.len(),
                    "cluster mode enabled"
                );
                Dispatcher::Cluster(Arc::new(ClusterRouter::new(cluster, executor)))
            }
            None => Dispatcher::Local(executor),
        };

        let (shutdown, _) = watch::channel(false);
        let connection_semaphore = Arc::new(Semaphore::new(config.max_clients));

        Ok(Self {
            config,
            database,
            dispatcher,
            aof: Mutex::new(aof),
            running: AtomicBool::new(false),
            stop: Arc::new(Notify::new()),
            shutdown,
            clients: DashMap::new(),
            connection_count: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            connection_semaphore,
            local_addr: Mutex::new(None),
            ready: Notify::new(),
        })
    }

    /// Run the server until [`shutdown`](Self::shutdown) is called.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until
    /// [`shutdown`](Self::shutdown) is called.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);
        self.running.store(true, Ordering::SeqCst);
        self.ready.notify_waiters();
        info!("Ready to accept connections tcp on {}", addr);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            if let Err(e) = socket.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY: {}", e);
                            }

                            // Acquire connection permit (provides backpressure)
                            let permit = match Arc::clone(&self.connection_semaphore).try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!("Max clients reached, rejecting connection from {}", peer_addr);
                                    let _ = socket.try_write(MAX_CLIENTS_REPLY);
                                    continue;
                                }
                            };

                            self.connection_count.fetch_add(1, Ordering::Relaxed);
                            let id = self.total_connections.fetch_add(1, Ordering::Relaxed) + 1;
                            let state = Arc::new(ClientState::new(id, Some(peer_addr)));
                            self.clients.insert(id, Arc::clone(&state));

                            let server = Arc::clone(&self);
                            sessions.spawn(async move {
                                let _permit = permit;

                                match Connection::new(
                                    socket,
                                    state,
                                    server.dispatcher.clone(),
                                    server.shutdown.subscribe(),
                                ) {
                                    Ok(mut connection) => {
                                        if let Err(e) = connection.run().await {
                                            debug!("Connection error from {}: {}", peer_addr, e);
                                        }
                                    }
                                    Err(e) => warn!("Dropping connection from {}: {}", peer_addr, e),
                                }

                                server.clients.remove(&id);
                                server.connection_count.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                _ = self.stop.notified() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(listener);
        self.running.store(false, Ordering::SeqCst);
        self.drain(sessions).await;

        if let Dispatcher::Cluster(router) = &self.dispatcher {
            router.close();
        }
        let aof = self.aof.lock().take();
        if let Some(aof) = aof {
            aof.shutdown().await;
        }

        info!("Server stopped");
        Ok(())
    }

    /// Stop sessions reading, wait for their replies to go out, then close
    /// whatever is left once the timeout passes.
    async fn drain(&self, mut sessions: JoinSet<()>) {
        let _ = self.shutdown.send(true);
        info!(
            "Waiting for {} active connections to close...",
            self.connection_count.load(Ordering::Relaxed)
        );

        let timeout = self.config.shutdown_timeout;
        let clients: Vec<Arc<ClientState>> =
            self.clients.iter().map(|c| Arc::clone(c.value())).collect();

        let drained = tokio::time::timeout(timeout, async {
            for client in &clients {
                client.wait_drained().await;
            }
            while sessions.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "Shutdown timeout reached, {} connections still active",
                self.connection_count.load(Ordering::Relaxed)
            );
            sessions.abort_all();
            while sessions.join_next().await.is_some() {}
        }
    }

    /// Signal the server to shutdown.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.notify_one();
    }

    /// Check if the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait until the listener is bound and return its address.
    pub async fn ready(&self) -> SocketAddr {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(addr) = *self.local_addr.lock() {
                return addr;
            }
            notified.await;
        }
    }

    /// Address the listener is bound to, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Get the current connection count.
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Get the database.
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where session commands are dispatched.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
