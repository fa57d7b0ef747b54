//! Cluster entity records
//!
//! Plain data records for everything the explorer displays. Remote payloads
//! are normalized into these types by the data-access layer, so the tree
//! never branches on untyped shape. Optional fields are optional because
//! the cluster omits them for some entity states, not as a convenience.

use crate::health::HealthState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the remote entity collections the explorer fetches.
///
/// The string form is the first segment of every data cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    ClusterHealth,
    Node,
    Application,
    Service,
    Partition,
    Replica,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::ClusterHealth,
        EntityKind::Node,
        EntityKind::Application,
        EntityKind::Service,
        EntityKind::Partition,
        EntityKind::Replica,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::ClusterHealth => "health",
            EntityKind::Node => "nodes",
            EntityKind::Application => "apps",
            EntityKind::Service => "services",
            EntityKind::Partition => "partitions",
            EntityKind::Replica => "replicas",
        }
    }

    /// Collections nested below this one in the application hierarchy.
    pub fn descendants(self) -> &'static [EntityKind] {
        match self {
            EntityKind::Application => &[
                EntityKind::Service,
                EntityKind::Partition,
                EntityKind::Replica,
            ],
            EntityKind::Service => &[EntityKind::Partition, EntityKind::Replica],
            EntityKind::Partition => &[EntityKind::Replica],
            EntityKind::ClusterHealth | EntityKind::Node | EntityKind::Replica => &[],
        }
    }
}

/// Whether a service keeps replicated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    Stateful,
    Stateless,
}

/// A machine (or VM) participating in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub id: Option<String>,
    pub node_type: Option<String>,
    pub ip_address_or_fqdn: Option<String>,
    pub upgrade_domain: Option<String>,
    pub fault_domain: Option<String>,
    pub is_seed_node: bool,
    pub node_status: Option<String>,
    pub health_state: HealthState,
}

/// A deployed application instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// Identifier used in REST paths (`fabric:/App` becomes `App`).
    pub id: String,
    /// Full application name, e.g. `fabric:/App`.
    pub name: String,
    pub type_name: String,
    pub type_version: String,
    pub status: Option<String>,
    pub health_state: HealthState,
}

/// A service inside an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub type_name: String,
    pub service_kind: ServiceKind,
    pub manifest_version: Option<String>,
    pub service_status: Option<String>,
    pub health_state: HealthState,
}

/// How a partition divides the service's key space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionScheme {
    Singleton,
    Int64Range { low_key: i64, high_key: i64 },
    Named { name: String },
}

/// A partition of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub partition_id: Uuid,
    pub service_kind: ServiceKind,
    pub scheme: PartitionScheme,
    pub partition_status: Option<String>,
    pub health_state: HealthState,
}

impl PartitionInfo {
    /// Short human description of the partition's key range.
    pub fn describe_scheme(&self) -> String {
        match &self.scheme {
            PartitionScheme::Singleton => "Singleton".to_string(),
            PartitionScheme::Int64Range { low_key, high_key } => {
                format!("{low_key}..{high_key}")
            }
            PartitionScheme::Named { name } => name.clone(),
        }
    }
}

/// A replica (stateful) or instance (stateless) of a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    /// Replica id for stateful services, instance id for stateless ones.
    pub id: String,
    pub node_name: String,
    pub address: Option<String>,
    /// `Primary`, `ActiveSecondary`, ... Absent for stateless instances.
    pub replica_role: Option<String>,
    pub replica_status: Option<String>,
    pub health_state: HealthState,
}

/// Health of one named entity inside a cluster health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHealthState {
    pub name: String,
    pub health_state: HealthState,
}

/// Coarse, precomputed cluster health.
///
/// Used to color group icons before their members are ever fetched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub aggregated_health_state: Option<HealthState>,
    pub node_health_states: Vec<EntityHealthState>,
    pub application_health_states: Vec<EntityHealthState>,
}

impl ClusterHealth {
    /// Worst health among all nodes in the snapshot.
    pub fn worst_node_health(&self) -> Option<HealthState> {
        crate::health::worst(self.node_health_states.iter().map(|n| Some(n.health_state)))
    }

    /// Worst health among all applications in the snapshot.
    pub fn worst_application_health(&self) -> Option<HealthState> {
        crate::health::worst(
            self.application_health_states
                .iter()
                .map(|a| Some(a.health_state)),
        )
    }
}
