//! Data-access contract consumed by tree nodes.
//!
//! One implementation talks to one cluster; parent identity is passed per
//! call. Implementations own timeouts and payload normalization.

use async_trait::async_trait;

use crate::entities::{ApplicationInfo, ClusterHealth, NodeInfo, PartitionInfo, ReplicaInfo, ServiceInfo};
use crate::error::FetchError;

/// Remote cluster queries used to populate the explorer tree.
#[async_trait]
pub trait ClusterDataSource: Send + Sync {
    /// Coarse health snapshot for the whole cluster.
    async fn cluster_health(&self) -> Result<ClusterHealth, FetchError>;

    /// All nodes in the cluster.
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError>;

    /// All deployed applications.
    async fn list_applications(&self) -> Result<Vec<ApplicationInfo>, FetchError>;

    /// Services of one application.
    async fn list_services(&self, application_id: &str) -> Result<Vec<ServiceInfo>, FetchError>;

    /// Partitions of one service.
    async fn list_partitions(&self, service_id: &str) -> Result<Vec<PartitionInfo>, FetchError>;

    /// Replicas (or instances) of one partition.
    async fn list_replicas(&self, partition_id: &str) -> Result<Vec<ReplicaInfo>, FetchError>;
}
