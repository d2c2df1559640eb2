//! Per-connection state.

use crate::types::DbIndex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Client connection state.
///
/// Holds the selected database and the bookkeeping shutdown needs to wait
/// for a session's outstanding writes. Owned by exactly one session; the
/// AOF replayer builds a detached one.
#[derive(Debug)]
pub struct ClientState {
    /// Connection ID
    id: u64,
    /// Remote address, if the client came in over the network
    addr: Option<SocketAddr>,
    /// Selected database index
    db_index: AtomicUsize,
    /// Set once the remote end announced itself as a cluster peer
    peer_link: AtomicBool,
    /// Connection is closed
    closed: AtomicBool,
    /// Replies handed to the socket but not yet flushed
    pending_writes: AtomicUsize,
    /// Signalled whenever `pending_writes` drops to zero
    drained: Notify,
}

impl ClientState {
    /// Create a new client state.
    pub fn new(id: u64, addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            addr,
            db_index: AtomicUsize::new(0),
            peer_link: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            pending_writes: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// State for commands that do not come from a socket, such as AOF replay.
    pub fn detached() -> Self {
        Self::new(0, None)
    }

    /// Get the connection ID.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote address for diagnostics.
    #[inline]
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Get the current database index.
    #[inline]
    pub fn db_index(&self) -> DbIndex {
        self.db_index.load(Ordering::Relaxed)
    }

    /// Set the current database index.
    #[inline]
    pub fn set_db_index(&self, index: DbIndex) {
        self.db_index.store(index, Ordering::Relaxed);
    }

    /// Whether commands on this connection were relayed by another node.
    #[inline]
    pub fn is_peer_link(&self) -> bool {
        self.peer_link.load(Ordering::Relaxed)
    }

    /// Mark this connection as a cluster peer link.
    #[inline]
    pub fn set_peer_link(&self) {
        self.peer_link.store(true, Ordering::Relaxed);
    }

    /// Check if the connection is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Close the connection.
    #[inline]
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Record the start of an outbound write.
    pub fn begin_write(&self) {
        self.pending_writes.fetch_add(1, Ordering::AcqRel);
    }

    /// Record the end of an outbound write, waking drain waiters at zero.
    pub fn end_write(&self) {
        if self.pending_writes.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Number of outbound writes still in flight.
    #[inline]
    pub fn pending_writes(&self) -> usize {
        self.pending_writes.load(Ordering::Acquire)
    }

    /// Wait until no outbound write is in flight.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending_writes() == 0 {
                return;
            }
            notified.await;
        }
    }
}
