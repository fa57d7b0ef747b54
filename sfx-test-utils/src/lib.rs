//! Cluster Explorer Test Utilities
//!
//! Shared test infrastructure for the explorer workspace:
//! - A scripted mock cluster data source
//! - Proptest generators for entity records
//! - Fixtures for common scenarios
//! - Assertions for explorer-specific results

pub use sfx_core::{
    ApplicationInfo, ClusterDataSource, ClusterHealth, EntityHealthState, ExplorerError,
    ExplorerResult, FetchError, HealthState, NodeInfo, PartitionInfo, PartitionScheme,
    ReplicaInfo, ServiceInfo, ServiceKind,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

// ============================================================================
// MOCK DATA SOURCE
// ============================================================================

/// The data-access operations, used to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ClusterHealth,
    Nodes,
    Applications,
    Services,
    Partitions,
    Replicas,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub cluster_health: usize,
    pub list_nodes: usize,
    pub list_applications: usize,
    pub list_services: usize,
    pub list_partitions: usize,
    pub list_replicas: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.cluster_health
            + self.list_nodes
            + self.list_applications
            + self.list_services
            + self.list_partitions
            + self.list_replicas
    }
}

#[derive(Default)]
struct Counters {
    cluster_health: AtomicUsize,
    list_nodes: AtomicUsize,
    list_applications: AtomicUsize,
    list_services: AtomicUsize,
    list_partitions: AtomicUsize,
    list_replicas: AtomicUsize,
}

#[derive(Default)]
struct Script {
    health: ClusterHealth,
    nodes: Vec<NodeInfo>,
    applications: Vec<ApplicationInfo>,
    services: HashMap<String, Vec<ServiceInfo>>,
    partitions: HashMap<String, Vec<PartitionInfo>>,
    replicas: HashMap<String, Vec<ReplicaInfo>>,
    failures: HashMap<Operation, FetchError>,
}

/// Scripted in-memory [`ClusterDataSource`].
///
/// Unknown parents answer an empty list. Payloads and failures can be
/// changed while the source is shared, so a test can alter what the
/// "cluster" reports between two fetches. A gated source holds every call
/// until [`MockClusterSource::release`] hands out permits.
#[derive(Default)]
pub struct MockClusterSource {
    script: Mutex<Script>,
    counters: Counters,
    gate: Option<Arc<Semaphore>>,
}

impl MockClusterSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until a permit is released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `calls` held calls proceed (no-op on an ungated source).
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn with_cluster_health(self, health: ClusterHealth) -> Self {
        self.script().health = health;
        self
    }

    pub fn with_nodes(self, nodes: Vec<NodeInfo>) -> Self {
        self.set_nodes(nodes);
        self
    }

    pub fn with_applications(self, applications: Vec<ApplicationInfo>) -> Self {
        self.set_applications(applications);
        self
    }

    pub fn with_services(self, application_id: &str, services: Vec<ServiceInfo>) -> Self {
        self.script()
            .services
            .insert(application_id.to_string(), services);
        self
    }

    pub fn with_partitions(self, service_id: &str, partitions: Vec<PartitionInfo>) -> Self {
        self.script()
            .partitions
            .insert(service_id.to_string(), partitions);
        self
    }

    pub fn with_replicas(self, partition_id: &str, replicas: Vec<ReplicaInfo>) -> Self {
        self.script()
            .replicas
            .insert(partition_id.to_string(), replicas);
        self
    }

    pub fn set_cluster_health(&self, health: ClusterHealth) {
        self.script().health = health;
    }

    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        self.script().nodes = nodes;
    }

    pub fn set_applications(&self, applications: Vec<ApplicationInfo>) {
        self.script().applications = applications;
    }

    /// Make every later call of `operation` fail with `error`.
    pub fn fail(&self, operation: Operation, error: FetchError) {
        self.script().failures.insert(operation, error);
    }

    pub fn recover(&self, operation: Operation) {
        self.script().failures.remove(&operation);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            cluster_health: c.cluster_health.load(Ordering::SeqCst),
            list_nodes: c.list_nodes.load(Ordering::SeqCst),
            list_applications: c.list_applications.load(Ordering::SeqCst),
            list_services: c.list_services.load(Ordering::SeqCst),
            list_partitions: c.list_partitions.load(Ordering::SeqCst),
            list_replicas: c.list_replicas.load(Ordering::SeqCst),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, wait at the gate, then answer from the script.
    async fn answer<T, F>(&self, operation: Operation, counter: &AtomicUsize, read: F) -> Result<T, FetchError>
    where
        F: FnOnce(&Script) -> T,
    {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let script = self.script();
        match script.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(read(&script)),
        }
    }
}

#[async_trait]
impl ClusterDataSource for MockClusterSource {
    async fn cluster_health(&self) -> Result<ClusterHealth, FetchError> {
        self.answer(Operation::ClusterHealth, &self.counters.cluster_health, |s| {
            s.health.clone()
        })
        .await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError> {
        self.answer(Operation::Nodes, &self.counters.list_nodes, |s| s.nodes.clone())
            .await
    }

    async fn list_applications(&self) -> Result<Vec<ApplicationInfo>, FetchError> {
        self.answer(Operation::Applications, &self.counters.list_applications, |s| {
            s.applications.clone()
        })
        .await
    }

    async fn list_services(&self, application_id: &str) -> Result<Vec<ServiceInfo>, FetchError> {
        self.answer(Operation::Services, &self.counters.list_services, |s| {
            s.services.get(application_id).cloned().unwrap_or_default()
        })
        .await
    }

    async fn list_partitions(&self, service_id: &str) -> Result<Vec<PartitionInfo>, FetchError> {
        self.answer(Operation::Partitions, &self.counters.list_partitions, |s| {
            s.partitions.get(service_id).cloned().unwrap_or_default()
        })
        .await
    }

    async fn list_replicas(&self, partition_id: &str) -> Result<Vec<ReplicaInfo>, FetchError> {
        self.answer(Operation::Replicas, &self.counters.list_replicas, |s| {
            s.replicas.get(partition_id).cloned().unwrap_or_default()
        })
        .await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for explorer records.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_health_state() -> impl Strategy<Value = HealthState> {
        prop_oneof![
            Just(HealthState::Unknown),
            Just(HealthState::Ok),
            Just(HealthState::Warning),
            Just(HealthState::Error),
        ]
    }

    pub fn arb_optional_health() -> impl Strategy<Value = Option<HealthState>> {
        proptest::option::of(arb_health_state())
    }

    pub fn arb_node_info() -> impl Strategy<Value = NodeInfo> {
        ("_Node_[0-9]{1,3}", arb_health_state(), any::<bool>()).prop_map(
            |(name, health_state, is_seed_node)| NodeInfo {
                is_seed_node,
                ..fixtures::node(&name, health_state)
            },
        )
    }

    /// Node lists with unique names.
    pub fn arb_node_list(max: usize) -> impl Strategy<Value = Vec<NodeInfo>> {
        proptest::collection::vec(arb_health_state(), 0..=max).prop_map(|states| {
            states
                .into_iter()
                .enumerate()
                .map(|(i, health)| fixtures::node(&format!("_Node_{i}"), health))
                .collect()
        })
    }

    pub fn arb_application_info() -> impl Strategy<Value = ApplicationInfo> {
        ("[A-Z][a-zA-Z0-9]{0,11}", arb_health_state())
            .prop_map(|(id, health_state)| fixtures::application(&id, health_state))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common testing scenarios.

    use super::*;
    use uuid::Uuid;

    pub fn node(name: &str, health_state: HealthState) -> NodeInfo {
        NodeInfo {
            name: name.to_string(),
            id: None,
            node_type: Some("NodeType0".to_string()),
            ip_address_or_fqdn: Some("10.0.0.4".to_string()),
            upgrade_domain: Some("0".to_string()),
            fault_domain: Some("fd:/0".to_string()),
            is_seed_node: false,
            node_status: Some("Up".to_string()),
            health_state,
        }
    }

    /// Application `fabric:/<id>` of type `AppType` 1.0.0.
    pub fn application(id: &str, health_state: HealthState) -> ApplicationInfo {
        ApplicationInfo {
            id: id.to_string(),
            name: format!("fabric:/{id}"),
            type_name: "AppType".to_string(),
            type_version: "1.0.0".to_string(),
            status: Some("Ready".to_string()),
            health_state,
        }
    }

    /// Stateful service; `App~Svc` is named `fabric:/App/Svc`.
    pub fn service(id: &str, health_state: HealthState) -> ServiceInfo {
        ServiceInfo {
            id: id.to_string(),
            name: format!("fabric:/{}", id.replace('~', "/")),
            type_name: "SvcType".to_string(),
            service_kind: ServiceKind::Stateful,
            manifest_version: Some("1.0.0".to_string()),
            service_status: Some("Active".to_string()),
            health_state,
        }
    }

    /// Deterministic partition id.
    pub fn partition_id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    pub fn partition(n: u128, health_state: HealthState) -> PartitionInfo {
        PartitionInfo {
            partition_id: partition_id(n),
            service_kind: ServiceKind::Stateful,
            scheme: PartitionScheme::Int64Range {
                low_key: i64::MIN,
                high_key: i64::MAX,
            },
            partition_status: Some("Ready".to_string()),
            health_state,
        }
    }

    /// Primary replica hosted on `node_name`.
    pub fn replica(id: &str, node_name: &str, health_state: HealthState) -> ReplicaInfo {
        ReplicaInfo {
            id: id.to_string(),
            node_name: node_name.to_string(),
            address: None,
            replica_role: Some("Primary".to_string()),
            replica_status: Some("Ready".to_string()),
            health_state,
        }
    }

    pub fn cluster_health(
        aggregated: HealthState,
        nodes: &[(&str, HealthState)],
        applications: &[(&str, HealthState)],
    ) -> ClusterHealth {
        let entries = |items: &[(&str, HealthState)]| {
            items
                .iter()
                .map(|(name, health_state)| EntityHealthState {
                    name: name.to_string(),
                    health_state: *health_state,
                })
                .collect()
        };
        ClusterHealth {
            aggregated_health_state: Some(aggregated),
            node_health_states: entries(nodes),
            application_health_states: entries(applications),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for explorer results.

    use super::*;

    /// Assert that an ExplorerResult is a fetch error.
    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &ExplorerResult<T>) {
        match result {
            Err(ExplorerError::Fetch(_)) => {}
            other => panic!("Expected Fetch error, got: {:?}", other),
        }
    }

    /// Assert that an ExplorerResult is a context error naming `field`.
    #[track_caller]
    pub fn assert_missing_context<T: std::fmt::Debug>(result: &ExplorerResult<T>, field: &str) {
        match result {
            Err(ExplorerError::Context(sfx_core::ContextError::Missing { field: f })) => {
                assert_eq!(*f, field, "Wrong missing field");
            }
            other => panic!("Expected missing context field {}, got: {:?}", field, other),
        }
    }
}
