//! Connection registry: the set of live push subscribers.
//!
//! The request server is the only writer (connect/disconnect); the broadcast
//! loop takes point-in-time copies and does its I/O with the lock released.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::PushError;

/// Anything that can deliver one serialized frame to a viewer.
pub trait PushChannel: Send + Sync {
    fn push(&self, frame: Arc<str>) -> BoxFuture<'_, Result<(), PushError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub peer: Option<SocketAddr>,
    pub channel: Arc<dyn PushChannel>,
}

impl Subscriber {
    /// Push one frame, treating a push that outlives `limit` as failed.
    pub async fn push_with_timeout(&self, frame: Arc<str>, limit: Duration) -> Result<(), PushError> {
        match tokio::time::timeout(limit, self.channel.push(frame)).await {
            Ok(r) => r,
            Err(_) => Err(PushError::Timeout(limit)),
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    members: Mutex<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-unique id; never reused.
    pub fn allocate_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Allocate an id, wrap `channel` and add it.
    pub async fn register(&self, channel: Arc<dyn PushChannel>, peer: Option<SocketAddr>) -> Subscriber {
        let sub = Subscriber {
            id: self.allocate_id(),
            peer,
            channel,
        };
        self.add(sub.clone()).await;
        sub
    }

    /// Returns false if a subscriber with that id was already present (it is replaced).
    pub async fn add(&self, sub: Subscriber) -> bool {
        let id = sub.id;
        let mut members = self.members.lock().await;
        let fresh = members.insert(id, sub).is_none();
        debug!(subscriber = %id, total = members.len(), "subscriber added");
        fresh
    }

    /// Idempotent. Returns whether anything was removed.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let mut members = self.members.lock().await;
        let removed = members.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = members.len(), "subscriber removed");
        }
        removed
    }

    /// Copy of the current members, ordered by id.
    pub async fn snapshot_members(&self) -> Vec<Subscriber> {
        let mut out: Vec<Subscriber> = self.members.lock().await.values().cloned().collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub async fn count(&self) -> usize {
        self.members.lock().await.len()
    }
}
