//! One explorer session: cache, scheduler and root for a single cluster.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use sfx_cache::DataCache;
use sfx_core::config::DEFAULT_CACHE_TTL_MS;
use sfx_core::{ClusterDataSource, ExplorerConfig, ExplorerResult};
use tokio::sync::mpsc;

use crate::context::TreeContext;
use crate::kinds::{cluster_root, reseed_groups};
use crate::node::TreeNode;
use crate::scheduler::{AutoRefreshCallback, RefreshEvent, RefreshScheduler, SchedulerConfig};

/// Session settings. `Default` matches the stock configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub cluster: String,
    pub cache_ttl: Duration,
    pub scheduler: SchedulerConfig,
}

impl SessionSettings {
    /// Settings for `cluster` with stock timings.
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Override the data cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Override scheduler timing.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}

impl From<&ExplorerConfig> for SessionSettings {
    fn from(config: &ExplorerConfig) -> Self {
        Self {
            cluster: config.cluster.name.clone(),
            cache_ttl: config.cache.ttl(),
            scheduler: SchedulerConfig::from(&config.refresh),
        }
    }
}

/// Owns the data cache, the refresh scheduler and the root node.
///
/// Dropping the session cancels its timers.
pub struct ExplorerSession {
    cluster: String,
    cache: Arc<DataCache>,
    scheduler: RefreshScheduler,
    root: Arc<TreeNode>,
}

impl std::fmt::Debug for ExplorerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerSession")
            .field("cluster", &self.cluster)
            .field("cache", &self.cache)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl ExplorerSession {
    /// Build a session. Must be called from within a Tokio runtime.
    pub fn new(
        source: Arc<dyn ClusterDataSource>,
        settings: SessionSettings,
    ) -> ExplorerResult<(Self, mpsc::Receiver<RefreshEvent>)> {
        let cache = Arc::new(DataCache::new(settings.cache_ttl));
        let (scheduler, events) = RefreshScheduler::new(settings.scheduler);
        let ctx = TreeContext::new(source, Arc::clone(&cache), scheduler.refresh_handle())
            .with_cluster(settings.cluster.as_str());
        let root = cluster_root(&ctx)?;

        tracing::info!(cluster = %settings.cluster, ttl_ms = settings.cache_ttl.as_millis() as u64, "explorer session created");
        let session = Self {
            cluster: settings.cluster,
            cache,
            scheduler,
            root,
        };
        Ok((session, events))
    }

    /// Cluster this session explores.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Root node of the tree.
    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    /// Data cache shared by every node of the session.
    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    /// Refresh scheduler feeding the renderer.
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Clear the data cache, invalidate the root and repaint everything.
    pub fn full_refresh(&self) {
        tracing::debug!(cluster = %self.cluster, "full refresh");
        self.cache.clear();
        self.root.invalidate();
        self.scheduler.refresh(None);
    }

    /// Drop `node`'s cached data, invalidate it and repaint it.
    ///
    /// This is what mutation commands call after changing an entity.
    pub fn refresh_node(&self, node: &Arc<TreeNode>) {
        if let Some(key) = node.cache_key() {
            let removed = self.cache.invalidate_subtree(key);
            tracing::debug!(node = %node.id(), removed, "dropped cached data for node");
        }
        node.invalidate();
        self.scheduler.refresh(Some(Arc::clone(node)));
    }

    /// Start the periodic refresh: each tick clears the cache, invalidates
    /// the root and re-seeds unexpanded groups from a fresh health snapshot.
    /// Returns false if already running.
    pub fn start_auto_refresh(&self) -> bool {
        let cache = Arc::clone(&self.cache);
        let root = Arc::clone(&self.root);
        let callback: AutoRefreshCallback = Arc::new(move || {
            let cache = Arc::clone(&cache);
            let root = Arc::clone(&root);
            async move {
                cache.clear();
                root.invalidate();
                reseed_groups(&root).await
            }
            .boxed()
        });
        self.scheduler.start_auto_refresh(callback)
    }

    /// Stop the periodic refresh. Returns whether it was running.
    pub fn stop_auto_refresh(&self) -> bool {
        self.scheduler.stop_auto_refresh()
    }

    /// Cancel timers and release the loaded tree.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.root.dispose();
        tracing::info!(cluster = %self.cluster, "explorer session shut down");
    }
}
