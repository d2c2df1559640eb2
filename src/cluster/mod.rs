//! Horizontal sharding across cooperating nodes.
//!
//! Keys are placed on a consistent-hash ring over node identities. A node
//! either runs a command itself or relays it over a pooled peer connection
//! that speaks the ordinary client protocol.

mod client;
mod pool;
mod ring;
mod router;

pub use client::PeerClient;
pub use pool::{Manager, PeerManager, PeerPool, Pool, PoolConfig, PoolStats, Pooled};
pub use ring::{ConsistentHash, HashFn};
pub use router::{ClusterRouter, aggregate};

use crate::commands::{CommandExecutor, ParsedCommand};
use crate::protocol::Frame;
use crate::server::ClientState;
use std::sync::Arc;
use std::time::Duration;

/// Cluster membership and relay tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// This node's identity, as peers dial it
    pub self_id: String,
    /// Identities of the other nodes
    pub peers: Vec<String>,
    /// Per-peer pool settings
    pub pool: PoolConfig,
    /// Deadline for one relayed exchange
    pub relay_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            self_id: String::new(),
            peers: Vec::new(),
            pool: PoolConfig::default(),
            relay_timeout: Duration::from_secs(5),
        }
    }
}

/// Where a session's commands go.
#[derive(Debug, Clone)]
pub enum Dispatcher {
    /// Single node: everything runs here
    Local(Arc<CommandExecutor>),
    /// Clustered: commands are placed by key
    Cluster(Arc<ClusterRouter>),
}

impl Dispatcher {
    /// Run a command and produce exactly one reply.
    pub async fn dispatch(&self, cmd: ParsedCommand, client: &ClientState) -> Frame {
        match self {
            Dispatcher::Local(executor) => executor.execute_to_frame(cmd, client).await,
            Dispatcher::Cluster(router) => router.dispatch(cmd, client).await,
        }
    }

    /// The executor that runs commands on this node.
    pub fn executor(&self) -> &Arc<CommandExecutor> {
        match self {
            Dispatcher::Local(executor) => executor,
            Dispatcher::Cluster(router) => router.executor(),
        }
    }
}
