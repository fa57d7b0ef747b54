//! Wire payloads and their normalization into core records.
//!
//! The management endpoint speaks PascalCase JSON, wraps lists in
//! `{ "ContinuationToken": ..., "Items": [...] }` and encodes 64-bit keys
//! as strings. Nothing here escapes the crate.

use serde::Deserialize;
use sfx_core::{
    ApplicationInfo, ClusterHealth, EntityHealthState, HealthState, NodeInfo, PartitionInfo,
    PartitionScheme, ReplicaInfo, ServiceInfo, ServiceKind,
};
use uuid::Uuid;

use crate::error::ClientError;

fn unknown_health() -> HealthState {
    HealthState::Unknown
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PagedList<T> {
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> PagedList<T> {
    /// Token for the next page; an empty token ends the listing.
    pub fn next_token(&self) -> Option<&str> {
        self.continuation_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ClusterHealthWire {
    #[serde(default)]
    aggregated_health_state: Option<HealthState>,
    #[serde(default)]
    node_health_states: Vec<EntityHealthWire>,
    #[serde(default)]
    application_health_states: Vec<EntityHealthWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntityHealthWire {
    #[serde(alias = "NodeName", alias = "ApplicationName")]
    name: String,
    #[serde(default = "unknown_health")]
    aggregated_health_state: HealthState,
}

impl From<ClusterHealthWire> for ClusterHealth {
    fn from(wire: ClusterHealthWire) -> Self {
        let entries = |states: Vec<EntityHealthWire>| {
            states
                .into_iter()
                .map(|s| EntityHealthState {
                    name: s.name,
                    health_state: s.aggregated_health_state,
                })
                .collect()
        };
        ClusterHealth {
            aggregated_health_state: wire.aggregated_health_state,
            node_health_states: entries(wire.node_health_states),
            application_health_states: entries(wire.application_health_states),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NodeWire {
    name: String,
    #[serde(default)]
    id: Option<NodeIdWire>,
    #[serde(rename = "Type", default)]
    node_type: Option<String>,
    #[serde(rename = "IpAddressOrFQDN", default)]
    ip_address_or_fqdn: Option<String>,
    #[serde(default)]
    upgrade_domain: Option<String>,
    #[serde(default)]
    fault_domain: Option<String>,
    #[serde(default)]
    is_seed_node: bool,
    #[serde(default)]
    node_status: Option<String>,
    #[serde(default = "unknown_health")]
    health_state: HealthState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeIdWire {
    id: String,
}

impl From<NodeWire> for NodeInfo {
    fn from(wire: NodeWire) -> Self {
        NodeInfo {
            name: wire.name,
            id: wire.id.map(|id| id.id),
            node_type: wire.node_type,
            ip_address_or_fqdn: wire.ip_address_or_fqdn,
            upgrade_domain: wire.upgrade_domain,
            fault_domain: wire.fault_domain,
            is_seed_node: wire.is_seed_node,
            node_status: wire.node_status,
            health_state: wire.health_state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ApplicationWire {
    id: String,
    name: String,
    type_name: String,
    type_version: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default = "unknown_health")]
    health_state: HealthState,
}

impl From<ApplicationWire> for ApplicationInfo {
    fn from(wire: ApplicationWire) -> Self {
        ApplicationInfo {
            id: wire.id,
            name: wire.name,
            type_name: wire.type_name,
            type_version: wire.type_version,
            status: wire.status,
            health_state: wire.health_state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceWire {
    id: String,
    name: String,
    type_name: String,
    service_kind: ServiceKind,
    #[serde(default)]
    manifest_version: Option<String>,
    #[serde(default)]
    service_status: Option<String>,
    #[serde(default = "unknown_health")]
    health_state: HealthState,
}

impl From<ServiceWire> for ServiceInfo {
    fn from(wire: ServiceWire) -> Self {
        ServiceInfo {
            id: wire.id,
            name: wire.name,
            type_name: wire.type_name,
            service_kind: wire.service_kind,
            manifest_version: wire.manifest_version,
            service_status: wire.service_status,
            health_state: wire.health_state,
        }
    }
}

/// 64-bit keys arrive as strings, older endpoints send numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64Wire {
    Number(i64),
    Text(String),
}

impl Int64Wire {
    fn parse(self, field: &str) -> Result<i64, ClientError> {
        match self {
            Int64Wire::Number(n) => Ok(n),
            Int64Wire::Text(text) => text.parse().map_err(|_| {
                ClientError::InvalidResponse(format!("{field} is not a 64-bit integer: {text}"))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PartitionInformationWire {
    service_partition_kind: String,
    id: String,
    #[serde(default)]
    low_key: Option<Int64Wire>,
    #[serde(default)]
    high_key: Option<Int64Wire>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PartitionWire {
    service_kind: ServiceKind,
    partition_information: PartitionInformationWire,
    #[serde(default)]
    partition_status: Option<String>,
    #[serde(default = "unknown_health")]
    health_state: HealthState,
}

impl TryFrom<PartitionWire> for PartitionInfo {
    type Error = ClientError;

    fn try_from(wire: PartitionWire) -> Result<Self, Self::Error> {
        let info = wire.partition_information;
        let partition_id = Uuid::parse_str(&info.id)
            .map_err(|e| ClientError::InvalidResponse(format!("partition id {}: {e}", info.id)))?;
        let scheme = match info.service_partition_kind.as_str() {
            "Singleton" => PartitionScheme::Singleton,
            "Int64Range" => match (info.low_key, info.high_key) {
                (Some(low), Some(high)) => PartitionScheme::Int64Range {
                    low_key: low.parse("LowKey")?,
                    high_key: high.parse("HighKey")?,
                },
                _ => {
                    return Err(ClientError::InvalidResponse(format!(
                        "partition {partition_id} is Int64Range without keys"
                    )))
                }
            },
            "Named" => PartitionScheme::Named {
                name: info.name.ok_or_else(|| {
                    ClientError::InvalidResponse(format!("partition {partition_id} is Named without a name"))
                })?,
            },
            other => {
                return Err(ClientError::InvalidResponse(format!(
                    "unknown partition kind {other}"
                )))
            }
        };
        Ok(PartitionInfo {
            partition_id,
            service_kind: wire.service_kind,
            scheme,
            partition_status: wire.partition_status,
            health_state: wire.health_state,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ReplicaWire {
    #[serde(default)]
    replica_id: Option<String>,
    #[serde(default)]
    instance_id: Option<String>,
    node_name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    replica_role: Option<String>,
    #[serde(default)]
    replica_status: Option<String>,
    #[serde(default = "unknown_health")]
    health_state: HealthState,
}

impl TryFrom<ReplicaWire> for ReplicaInfo {
    type Error = ClientError;

    fn try_from(wire: ReplicaWire) -> Result<Self, Self::Error> {
        let id = wire.replica_id.or(wire.instance_id).ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "replica on {} has neither ReplicaId nor InstanceId",
                wire.node_name
            ))
        })?;
        Ok(ReplicaInfo {
            id,
            node_name: wire.node_name,
            address: wire.address,
            replica_role: wire.replica_role,
            replica_status: wire.replica_status,
            health_state: wire.health_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_page() {
        let page: PagedList<NodeWire> = serde_json::from_str(
            r#"{
                "ContinuationToken": "",
                "Items": [{
                    "Name": "_Node_0",
                    "Id": { "Id": "6a4e3f" },
                    "Type": "NodeType0",
                    "IpAddressOrFQDN": "10.0.0.4",
                    "IsSeedNode": true,
                    "NodeStatus": "Up",
                    "HealthState": "Ok"
                }]
            }"#,
        )
        .unwrap();
        assert!(page.next_token().is_none());

        let node = NodeInfo::from(page.items.into_iter().next().unwrap());
        assert_eq!(node.id.as_deref(), Some("6a4e3f"));
        assert!(node.is_seed_node);
        assert_eq!(node.upgrade_domain, None);
        assert_eq!(node.health_state, HealthState::Ok);
    }

    #[test]
    fn test_invalid_health_reads_as_unknown() {
        let app: ApplicationWire = serde_json::from_str(
            r#"{"Id":"App","Name":"fabric:/App","TypeName":"AppType","TypeVersion":"1.0","HealthState":"Invalid"}"#,
        )
        .unwrap();
        assert_eq!(ApplicationInfo::from(app).health_state, HealthState::Unknown);
    }

    #[test]
    fn test_int64_partition_with_string_keys() {
        let wire: PartitionWire = serde_json::from_str(
            r#"{
                "ServiceKind": "Stateful",
                "PartitionInformation": {
                    "ServicePartitionKind": "Int64Range",
                    "Id": "8a0c9ea0-7a3f-4e0d-9f7c-2c1b0a3d4e5f",
                    "LowKey": "-9223372036854775808",
                    "HighKey": "9223372036854775807"
                },
                "PartitionStatus": "Ready",
                "HealthState": "Warning"
            }"#,
        )
        .unwrap();
        let partition = PartitionInfo::try_from(wire).unwrap();
        assert_eq!(
            partition.scheme,
            PartitionScheme::Int64Range {
                low_key: i64::MIN,
                high_key: i64::MAX
            }
        );
        assert_eq!(partition.health_state, HealthState::Warning);
    }

    #[test]
    fn test_partition_with_bad_id_is_rejected() {
        let wire: PartitionWire = serde_json::from_str(
            r#"{"ServiceKind":"Stateless","PartitionInformation":{"ServicePartitionKind":"Singleton","Id":"not-a-uuid"}}"#,
        )
        .unwrap();
        assert!(matches!(
            PartitionInfo::try_from(wire),
            Err(ClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_stateless_instance_id() {
        let wire: ReplicaWire = serde_json::from_str(
            r#"{"ServiceKind":"Stateless","InstanceId":"1322","NodeName":"_Node_2","HealthState":"Ok"}"#,
        )
        .unwrap();
        let replica = ReplicaInfo::try_from(wire).unwrap();
        assert_eq!(replica.id, "1322");
        assert_eq!(replica.replica_role, None);
    }

    #[test]
    fn test_cluster_health_snapshot() {
        let wire: ClusterHealthWire = serde_json::from_str(
            r#"{
                "AggregatedHealthState": "Warning",
                "NodeHealthStates": [{"Name": "_Node_0", "AggregatedHealthState": "Ok"}],
                "ApplicationHealthStates": [{"Name": "fabric:/App", "AggregatedHealthState": "Warning"}]
            }"#,
        )
        .unwrap();
        let health = ClusterHealth::from(wire);
        assert_eq!(health.worst_application_health(), Some(HealthState::Warning));
        assert_eq!(health.node_health_states.len(), 1);
    }
}
