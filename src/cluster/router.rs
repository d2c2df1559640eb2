//! Command routing across the ring.
//!
//! Each command's [`Routing`] decides where it runs: on the receiving node,
//! on the owner of its first key, on the common owner of its first two keys,
//! or on every node with the replies folded into one.

use super::ClusterConfig;
use super::pool::{PeerManager, PeerPool};
use super::ring::ConsistentHash;
use crate::commands::{CommandExecutor, ParsedCommand, Routing};
use crate::error::{CommandError, Error, Result, RoutingError};
use crate::protocol::Frame;
use crate::server::ClientState;
use bytes::Bytes;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Routes commands to the node that owns their keys.
#[derive(Debug)]
pub struct ClusterRouter {
    /// This node's identity on the ring
    self_id: String,
    /// Ring over self and peers
    ring: ConsistentHash,
    /// One pool per peer
    pools: HashMap<String, Arc<PeerPool>>,
    /// Local execution
    executor: Arc<CommandExecutor>,
    /// Deadline for one relay, borrowing the connection included
    relay_timeout: Duration,
}

impl ClusterRouter {
    /// Build the ring and one connection pool per peer.
    ///
    /// Connections are opened lazily on first relay.
    pub fn new(config: ClusterConfig, executor: Arc<CommandExecutor>) -> Self {
        let mut ring = ConsistentHash::new();
        ring.add_nodes(config.peers.iter().cloned());
        ring.add_nodes([config.self_id.clone()]);

        let pools = config
            .peers
            .iter()
            .filter(|peer| !peer.is_empty() && **peer != config.self_id)
            .map(|peer| {
                let pool = PeerPool::new(peer.clone(), PeerManager::new(peer.clone()), config.pool);
                (peer.clone(), Arc::new(pool))
            })
            .collect();

        Self {
            self_id: config.self_id,
            ring,
            pools,
            executor,
            relay_timeout: config.relay_timeout,
        }
    }

    /// This node's identity.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// The ring commands are placed on.
    pub fn ring(&self) -> &ConsistentHash {
        &self.ring
    }

    /// The local executor.
    pub fn executor(&self) -> &Arc<CommandExecutor> {
        &self.executor
    }

    /// Node owning `key`.
    pub fn owner(&self, key: &[u8]) -> &str {
        self.ring.pick_node(key).unwrap_or(&self.self_id)
    }

    /// Route a command and render any error as an error reply.
    pub async fn dispatch(&self, cmd: ParsedCommand, client: &ClientState) -> Frame {
        match self.route(cmd, client).await {
            Ok(frame) => frame,
            Err(e) => Frame::error(e.to_reply_error()),
        }
    }

    /// Route a command to where it must run.
    ///
    /// Commands arriving over a peer link were already routed by the
    /// sender and always run here.
    pub async fn route(&self, cmd: ParsedCommand, client: &ClientState) -> Result<Frame> {
        if client.is_peer_link() {
            return self.executor.execute(cmd, client).await;
        }

        let Some(command) = self.executor.registry().get(&cmd.name) else {
            return Err(CommandError::UnknownCommand(cmd.name).into());
        };
        command.check_arity(&cmd)?;
        let routing = command.routing;

        match routing {
            Routing::Local => self.executor.execute(cmd, client).await,
            Routing::FirstKey => {
                let key = cmd.get_arg(0).ok_or_else(|| cmd.wrong_arity())?;
                let node = self.owner(key).to_string();
                self.execute_on(&node, cmd, client).await
            }
            Routing::SameNode => {
                let (Some(src), Some(dst)) = (cmd.get_arg(0), cmd.get_arg(1)) else {
                    return Err(cmd.wrong_arity());
                };
                let node = self.owner(src).to_string();
                if self.owner(dst) != node {
                    return Err(RoutingError::CrossNode {
                        command: cmd.name.to_lowercase(),
                    }
                    .into());
                }
                self.execute_on(&node, cmd, client).await
            }
            Routing::Broadcast => self.broadcast(cmd, client).await,
        }
    }

    async fn execute_on(
        &self,
        node: &str,
        cmd: ParsedCommand,
        client: &ClientState,
    ) -> Result<Frame> {
        if node == self.self_id {
            self.executor.execute(cmd, client).await
        } else {
            self.relay(node, client.db_index(), &cmd).await
        }
    }

    /// Send a command to every node and fold the replies.
    async fn broadcast(&self, cmd: ParsedCommand, client: &ClientState) -> Result<Frame> {
        let db = client.db_index();
        let calls = self.ring.nodes().map(|node| {
            let cmd = cmd.clone();
            async move {
                let reply = self.execute_on(node, cmd, client).await;
                (node.to_string(), reply)
            }
        });

        let replies = join_all(calls).await;
        trace!(command = %cmd.name, db, nodes = replies.len(), "broadcast complete");
        aggregate(replies)
    }

    /// Relay a command to `node` and return its reply verbatim.
    ///
    /// The peer connection is aligned to `db` first since pooled
    /// connections carry no selection across borrows. One deadline covers
    /// the borrow (dial and handshake included) and the exchange.
    pub async fn relay(&self, node: &str, db: usize, cmd: &ParsedCommand) -> Result<Frame> {
        let pool = self
            .pools
            .get(node)
            .ok_or_else(|| RoutingError::UnknownPeer(node.to_string()))?;
        let deadline = Instant::now() + self.relay_timeout;

        let mut conn = match tokio::time::timeout_at(deadline, pool.get()).await {
            Ok(conn) => conn?,
            Err(_) => {
                warn!(peer = node, command = %cmd.name, "relay timed out waiting for a connection");
                return Err(RoutingError::Timeout(node.to_string()).into());
            }
        };

        let exchange = async {
            let select = conn
                .call([
                    Bytes::from_static(b"SELECT"),
                    Bytes::from(db.to_string()),
                ])
                .await?;
            if select.is_error() {
                return Ok(select);
            }
            conn.send(&cmd.to_frame()).await
        };

        let outcome = tokio::time::timeout_at(deadline, exchange).await;
        match outcome {
            Ok(Ok(reply)) => {
                conn.release();
                debug!(peer = node, command = %cmd.name, "relayed");
                Ok(reply)
            }
            Ok(Err(e)) => {
                warn!(peer = node, command = %cmd.name, error = %e, "relay failed");
                Err(RoutingError::PeerUnavailable {
                    peer: node.to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
            Err(_) => {
                warn!(peer = node, command = %cmd.name, "relay timed out");
                Err(RoutingError::Timeout(node.to_string()).into())
            }
        }
    }

    /// Close every peer pool.
    pub fn close(&self) {
        for pool in self.pools.values() {
            pool.close();
        }
    }
}

/// Fold one reply per node into a single reply.
///
/// Any error wins and no partial result is produced. Integers are summed,
/// statuses collapse to `+OK` and arrays are concatenated.
pub fn aggregate(replies: Vec<(String, Result<Frame>)>) -> Result<Frame> {
    let mut replies = replies.into_iter();
    let Some(first) = replies.next() else {
        return Ok(Frame::ok());
    };

    let node = first.0.clone();
    let mut acc = match settle(first)? {
        Frame::Simple(_) => Frame::ok(),
        frame @ (Frame::Integer(_) | Frame::Array(_)) => frame,
        _ => return Err(RoutingError::UnexpectedReply(node).into()),
    };

    for reply in replies {
        let node = reply.0.clone();
        acc = match (acc, settle(reply)?) {
            (Frame::Integer(a), Frame::Integer(b)) => Frame::Integer(a + b),
            (Frame::Simple(_), Frame::Simple(_)) => Frame::ok(),
            (Frame::Array(mut a), Frame::Array(b)) => {
                a.extend(b);
                Frame::Array(a)
            }
            _ => return Err(RoutingError::UnexpectedReply(node).into()),
        };
    }
    Ok(acc)
}

fn settle((node, reply): (String, Result<Frame>)) -> Result<Frame> {
    match reply {
        Ok(Frame::Error(message)) => Err(RoutingError::Broadcast { node, message }.into()),
        Ok(frame) => Ok(frame),
        Err(e) => Err(Error::from(RoutingError::Broadcast {
            node,
            message: e.to_reply_error(),
        })),
    }
}
