//! Last-known-good snapshot. Written by the broadcast loop and by on-demand
//! fresh samples; read by every request handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::types::Snapshot;

#[derive(Clone)]
struct Entry {
    snapshot: Arc<Snapshot>,
    at: Instant,
}

#[derive(Default)]
pub struct SnapshotCache {
    slot: RwLock<Option<Entry>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<Snapshot>> {
        self.slot.read().await.as_ref().map(|e| Arc::clone(&e.snapshot))
    }

    pub async fn set(&self, snapshot: Arc<Snapshot>) {
        *self.slot.write().await = Some(Entry {
            snapshot,
            at: Instant::now(),
        });
    }

    /// Stores `snapshot` unless the cache already holds a newer one.
    /// Returns whether it was stored.
    pub async fn set_if_newer(&self, snapshot: Arc<Snapshot>) -> bool {
        let mut slot = self.slot.write().await;
        if let Some(cur) = slot.as_ref() {
            if cur.snapshot.timestamp > snapshot.timestamp {
                return false;
            }
        }
        *slot = Some(Entry {
            snapshot,
            at: Instant::now(),
        });
        true
    }

    /// Time since the cached snapshot was stored.
    pub async fn age(&self) -> Option<Duration> {
        self.slot.read().await.as_ref().map(|e| e.at.elapsed())
    }
}
