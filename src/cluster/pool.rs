//! Bounded pool of reusable peer connections.
//!
//! Resources are produced and checked by a [`Manager`]: `create` opens a new
//! one, `validate` checks an idle one before it is handed out again, and
//! `destroy` closes it. Idle resources sit in a lock-free `ArrayQueue`;
//! a semaphore caps how many exist at once, so a borrow waits for a slot
//! and gives up after the borrow timeout.
//!
//! A borrowed resource only goes back to the pool through
//! [`Pooled::release`]. Dropping the guard destroys it, so a cancelled
//! exchange never leaves a half-read connection behind.

use super::client::PeerClient;
use crate::error::{Result, RoutingError};
use crossbeam_queue::ArrayQueue;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

/// Lifecycle hooks for pooled resources.
pub trait Manager: Send + Sync + 'static {
    /// The pooled resource.
    type Resource: Send + 'static;

    /// Open a new resource.
    fn create(&self) -> impl Future<Output = Result<Self::Resource>> + Send;

    /// Check an idle resource; `false` means destroy it.
    fn validate(&self, resource: &mut Self::Resource) -> impl Future<Output = bool> + Send;

    /// Close a resource that will not be reused.
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}

/// Pool sizing and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum resources in existence, idle or borrowed
    pub max_size: usize,
    /// How long a borrow waits for a free slot
    pub borrow_timeout: Duration,
    /// Idle resources older than this are validated before reuse
    pub validate_after: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            borrow_timeout: Duration::from_secs(5),
            validate_after: Duration::from_secs(1),
        }
    }
}

/// Statistics for pool monitoring.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Resources opened by the manager.
    pub created: AtomicUsize,
    /// Borrows served from the idle queue.
    pub reused: AtomicUsize,
    /// Resources closed, broken or failed validation.
    pub destroyed: AtomicUsize,
    /// Borrows that timed out waiting for a slot.
    pub exhausted: AtomicUsize,
}

struct Idle<R> {
    resource: R,
    since: Instant,
}

/// A pool of resources for one target.
pub struct Pool<M: Manager> {
    name: String,
    manager: M,
    idle: ArrayQueue<Idle<M::Resource>>,
    slots: Arc<Semaphore>,
    config: PoolConfig,
    stats: PoolStats,
}

impl<M: Manager> Pool<M> {
    /// Create an empty pool. `name` identifies the target in errors.
    pub fn new(name: impl Into<String>, manager: M, config: PoolConfig) -> Self {
        let max_size = config.max_size.max(1);
        Self {
            name: name.into(),
            manager,
            idle: ArrayQueue::new(max_size),
            slots: Arc::new(Semaphore::new(max_size)),
            config,
            stats: PoolStats::default(),
        }
    }

    /// Target this pool connects to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Number of idle resources.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Borrow a resource, reusing an idle one when it passes validation.
    pub async fn get(self: &Arc<Self>) -> Result<Pooled<M>> {
        let permit = match tokio::time::timeout(
            self.config.borrow_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(RoutingError::PeerUnavailable {
                    peer: self.name.clone(),
                    reason: "pool closed".to_string(),
                }
                .into());
            }
            Err(_) => {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                return Err(RoutingError::PoolExhausted(self.name.clone()).into());
            }
        };

        while let Some(Idle {
            mut resource,
            since,
        }) = self.idle.pop()
        {
            if since.elapsed() < self.config.validate_after
                || self.validate(&mut resource).await
            {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                return Ok(Pooled::new(Arc::clone(self), resource, permit));
            }
            debug!(pool = %self.name, "idle resource failed validation");
            self.destroy(resource);
        }

        let created = tokio::time::timeout(self.config.borrow_timeout, self.manager.create()).await;
        let resource = match created {
            Ok(Ok(resource)) => resource,
            Ok(Err(e)) => {
                return Err(RoutingError::PeerUnavailable {
                    peer: self.name.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
            Err(_) => {
                debug!(pool = %self.name, "opening a resource timed out");
                return Err(RoutingError::Timeout(self.name.clone()).into());
            }
        };
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        trace!(pool = %self.name, "opened new resource");
        Ok(Pooled::new(Arc::clone(self), resource, permit))
    }

    /// Check an idle resource. A check that outlasts the borrow timeout fails.
    async fn validate(&self, resource: &mut M::Resource) -> bool {
        tokio::time::timeout(self.config.borrow_timeout, self.manager.validate(resource))
            .await
            .unwrap_or(false)
    }

    /// Stop handing out resources and close every idle one.
    pub fn close(&self) {
        self.slots.close();
        while let Some(idle) = self.idle.pop() {
            self.destroy(idle.resource);
        }
    }

    fn put(&self, resource: M::Resource) {
        if self.slots.is_closed() {
            self.destroy(resource);
            return;
        }
        if let Err(rejected) = self.idle.push(Idle {
            resource,
            since: Instant::now(),
        }) {
            self.destroy(rejected.resource);
        }
    }

    fn destroy(&self, resource: M::Resource) {
        self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
        self.manager.destroy(resource);
    }
}

impl<M: Manager> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("idle", &self.idle.len())
            .field("available", &self.slots.available_permits())
            .field("config", &self.config)
            .finish()
    }
}

/// A borrowed resource. Dropping it destroys the resource.
pub struct Pooled<M: Manager> {
    resource: Option<M::Resource>,
    pool: Arc<Pool<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: Manager> Pooled<M> {
    fn new(pool: Arc<Pool<M>>, resource: M::Resource, permit: OwnedSemaphorePermit) -> Self {
        Self {
            resource: Some(resource),
            pool,
            _permit: permit,
        }
    }

    /// Hand the resource back for reuse.
    pub fn release(mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.put(resource);
        }
    }
}

impl<M: Manager> std::ops::Deref for Pooled<M> {
    type Target = M::Resource;

    fn deref(&self) -> &Self::Target {
        match &self.resource {
            Some(resource) => resource,
            None => unreachable!("pooled resource is only taken by value"),
        }
    }
}

impl<M: Manager> std::ops::DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.resource {
            Some(resource) => resource,
            None => unreachable!("pooled resource is only taken by value"),
        }
    }
}

impl<M: Manager> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.destroy(resource);
        }
    }
}

/// Opens [`PeerClient`] connections to one peer.
#[derive(Debug, Clone)]
pub struct PeerManager {
    peer: String,
}

impl PeerManager {
    /// Manager for connections to `peer`.
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }
}

impl Manager for PeerManager {
    type Resource = PeerClient;

    async fn create(&self) -> Result<PeerClient> {
        PeerClient::connect(&self.peer).await
    }

    async fn validate(&self, client: &mut PeerClient) -> bool {
        client.ping().await
    }
}

/// Pool of connections to one peer.
pub type PeerPool = Pool<PeerManager>;
