//! Cluster node leaves.

use std::sync::Arc;

use sfx_core::NodeInfo;

use crate::context::TreeContext;
use crate::kinds::child_id;
use crate::node::{Summary, TreeNode};
use crate::view::{NodeKind, NodeSnapshot, ViewModel};

/// Leaf for one cluster node.
pub fn cluster_node(ctx: &TreeContext, parent_id: &str, info: &NodeInfo) -> Arc<TreeNode> {
    let description = describe(info);
    let label = info.name.clone();
    TreeNode::builder(child_id(parent_id, &info.name), NodeKind::ClusterNode, ctx.clone())
        .summary(Summary::with_health(Some(info.health_state)))
        .view(move |snapshot: &NodeSnapshot<'_>| {
            ViewModel::new(snapshot.id, snapshot.kind, label.as_str())
                .with_description(description.as_str())
                .with_health(snapshot.summary.health)
        })
        .build()
}

fn describe(info: &NodeInfo) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(node_type) = info.node_type.as_deref() {
        parts.push(node_type);
    }
    if let Some(address) = info.ip_address_or_fqdn.as_deref() {
        parts.push(address);
    }
    if let Some(status) = info.node_status.as_deref() {
        parts.push(status);
    }
    if info.is_seed_node {
        parts.push("seed");
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfx_core::HealthState;
    use sfx_test_utils::fixtures;

    #[test]
    fn test_describe_skips_missing_fields() {
        let mut info = fixtures::node("_Node_0", HealthState::Ok);
        info.node_type = Some("NodeType0".to_string());
        info.ip_address_or_fqdn = None;
        info.node_status = Some("Up".to_string());
        info.is_seed_node = true;
        assert_eq!(describe(&info), "NodeType0 | Up | seed");
    }
}
