//! Ambient dependencies handed down the tree.
//!
//! Each level derives its children's context by shallow-merging overrides
//! onto its own. A node never mutates the context it was given.

use std::fmt;
use std::sync::Arc;

use sfx_cache::DataCache;
use sfx_core::{ClusterDataSource, ContextError};

use crate::node::TreeNode;
use crate::scheduler::RefreshHandle;

/// Fields a derived context may replace. Absent fields inherit.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub cluster: Option<String>,
    pub application_id: Option<String>,
    pub service_id: Option<String>,
    pub partition_id: Option<String>,
}

#[derive(Clone)]
pub struct TreeContext {
    source: Arc<dyn ClusterDataSource>,
    cache: Arc<DataCache>,
    refresh: RefreshHandle,
    cluster: Option<Arc<str>>,
    application_id: Option<Arc<str>>,
    service_id: Option<Arc<str>>,
    partition_id: Option<Arc<str>>,
}

impl fmt::Debug for TreeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeContext")
            .field("cluster", &self.cluster)
            .field("application_id", &self.application_id)
            .field("service_id", &self.service_id)
            .field("partition_id", &self.partition_id)
            .finish_non_exhaustive()
    }
}

impl TreeContext {
    /// Root context: collaborators only, no identifiers yet.
    pub fn new(
        source: Arc<dyn ClusterDataSource>,
        cache: Arc<DataCache>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            source,
            cache,
            refresh,
            cluster: None,
            application_id: None,
            service_id: None,
            partition_id: None,
        }
    }

    /// New context with `overrides` applied on top of this one.
    pub fn derive(&self, overrides: ContextOverrides) -> Self {
        let mut derived = self.clone();
        if let Some(cluster) = overrides.cluster {
            derived.cluster = Some(cluster.into());
        }
        if let Some(id) = overrides.application_id {
            derived.application_id = Some(id.into());
        }
        if let Some(id) = overrides.service_id {
            derived.service_id = Some(id.into());
        }
        if let Some(id) = overrides.partition_id {
            derived.partition_id = Some(id.into());
        }
        derived
    }

    /// Derived context naming the cluster.
    pub fn with_cluster(&self, cluster: impl Into<String>) -> Self {
        self.derive(ContextOverrides {
            cluster: Some(cluster.into()),
            ..Default::default()
        })
    }

    /// Derived context naming the application.
    pub fn with_application(&self, application_id: impl Into<String>) -> Self {
        self.derive(ContextOverrides {
            application_id: Some(application_id.into()),
            ..Default::default()
        })
    }

    /// Derived context naming the service.
    pub fn with_service(&self, service_id: impl Into<String>) -> Self {
        self.derive(ContextOverrides {
            service_id: Some(service_id.into()),
            ..Default::default()
        })
    }

    /// Derived context naming the partition.
    pub fn with_partition(&self, partition_id: impl Into<String>) -> Self {
        self.derive(ContextOverrides {
            partition_id: Some(partition_id.into()),
            ..Default::default()
        })
    }

    /// Remote data access.
    pub fn source(&self) -> &Arc<dyn ClusterDataSource> {
        &self.source
    }

    /// Session data cache shared by every node.
    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    /// Callback into the refresh scheduler.
    pub fn refresh_handle(&self) -> &RefreshHandle {
        &self.refresh
    }

    /// Cluster identity, required by every fetch.
    pub fn cluster(&self) -> Result<&str, ContextError> {
        require(&self.cluster, "cluster")
    }

    /// Application identity, set below an application node.
    pub fn application_id(&self) -> Result<&str, ContextError> {
        require(&self.application_id, "application_id")
    }

    /// Service identity, set below a service node.
    pub fn service_id(&self) -> Result<&str, ContextError> {
        require(&self.service_id, "service_id")
    }

    /// Partition identity, set below a partition node.
    pub fn partition_id(&self) -> Result<&str, ContextError> {
        require(&self.partition_id, "partition_id")
    }

    /// Ask the scheduler for a renderer notification. `None` means the
    /// whole tree.
    pub fn request_refresh(&self, node: Option<Arc<TreeNode>>) {
        self.refresh.request(node);
    }
}

fn require<'a>(value: &'a Option<Arc<str>>, field: &'static str) -> Result<&'a str, ContextError> {
    value.as_deref().ok_or(ContextError::Missing { field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfx_test_utils::MockClusterSource;

    fn base() -> TreeContext {
        TreeContext::new(
            Arc::new(MockClusterSource::new()),
            Arc::new(DataCache::default()),
            RefreshHandle::detached(),
        )
    }

    #[test]
    fn test_derive_inherits_and_overrides() {
        let root = base().with_cluster("c1");
        let app = root.with_application("App");
        let service = app.derive(ContextOverrides {
            service_id: Some("App~Svc".to_string()),
            ..Default::default()
        });

        assert_eq!(service.cluster().unwrap(), "c1");
        assert_eq!(service.application_id().unwrap(), "App");
        assert_eq!(service.service_id().unwrap(), "App~Svc");
        assert!(root.application_id().is_err(), "parent context is untouched");
    }

    #[test]
    fn test_missing_field_names_it() {
        let err = base().partition_id().unwrap_err();
        assert_eq!(
            err,
            ContextError::Missing {
                field: "partition_id"
            }
        );
    }

    #[test]
    fn test_derived_contexts_share_cache() {
        let root = base().with_cluster("c1");
        let child = root.with_application("App");
        assert!(Arc::ptr_eq(root.cache(), child.cache()));
    }
}
