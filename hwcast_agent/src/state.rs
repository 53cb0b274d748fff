//! Shared agent state: one value built at startup and cloned into every task.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::SnapshotCache;
use crate::config::{BroadcastSettings, MonitoringConfig, ServerConfig, SharedConfig};
use crate::error::SampleError;
use crate::hardware::HardwareSource;
use crate::proto::SnapshotSource;
use crate::registry::ConnectionRegistry;
use crate::sampler::Sampler;
use crate::types::Snapshot;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SharedConfig>,
    pub sampler: Arc<Sampler>,
    pub cache: Arc<SnapshotCache>,
    pub registry: Arc<ConnectionRegistry>,
    pub settings: BroadcastSettings,
    pub server: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        source: Arc<dyn HardwareSource>,
        monitoring: MonitoringConfig,
        settings: BroadcastSettings,
        server: ServerConfig,
    ) -> Self {
        let config = Arc::new(SharedConfig::new(monitoring));
        let sampler = Sampler::new(source, Arc::clone(&config), settings.sample_timeout);
        Self {
            config,
            sampler: Arc::new(sampler),
            cache: Arc::new(SnapshotCache::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            settings,
            server: Arc::new(server),
            started_at: Instant::now(),
        }
    }

    /// Cached snapshot, or a synchronous sample when the cache is empty or
    /// `fresh` is set. Fresh samples are written back unless the broadcast
    /// loop has already stored a newer one.
    pub async fn current_snapshot(
        &self,
        fresh: bool,
    ) -> Result<(Arc<Snapshot>, SnapshotSource), SampleError> {
        if !fresh {
            if let Some(s) = self.cache.get().await {
                return Ok((s, SnapshotSource::Cache));
            }
        }
        let snap = Arc::new(self.sampler.sample().await?);
        if !self.cache.set_if_newer(Arc::clone(&snap)).await {
            debug!("on-demand sample older than cached snapshot; cache kept");
        }
        Ok((snap, SnapshotSource::Fresh))
    }

    /// Cached snapshot, sampling once if nothing is cached yet.
    pub async fn latest(&self) -> Result<Arc<Snapshot>, SampleError> {
        self.current_snapshot(false).await.map(|(s, _)| s)
    }
}
