//! Cluster root.

use std::sync::Arc;

use sfx_cache::CacheKey;
use sfx_core::{ClusterHealth, EntityKind, ExplorerResult};

use crate::context::TreeContext;
use crate::kinds::groups::{applications_group, nodes_group};
use crate::node::{FetchRequest, Fetched, TreeNode};
use crate::policy::InvalidationPolicy;
use crate::view::{NodeKind, NodeSnapshot, ViewModel};

/// Root node for the cluster named in `ctx`.
///
/// Fails with a context error when `ctx` carries no cluster identity.
pub fn cluster_root(ctx: &TreeContext) -> ExplorerResult<Arc<TreeNode>> {
    let cluster = ctx.cluster()?.to_string();
    let key = CacheKey::new(EntityKind::ClusterHealth, cluster.as_str());
    let node = TreeNode::builder(cluster, NodeKind::Cluster, ctx.clone())
        .policy(InvalidationPolicy::Preserving)
        .protected(true)
        .cache_key(key.clone())
        .fetch(move |request| load_groups(request, key.to_string()))
        .view(root_view)
        .build();
    Ok(node)
}

async fn load_groups(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let source = Arc::clone(ctx.source());
    let snapshot = match ctx
        .cache()
        .get_or_fetch(&key, || async move { source.cluster_health().await })
        .await
    {
        Ok(read) => Some(read.into_value()),
        Err(e) => {
            tracing::warn!(node = %node_id, error = %e, "cluster health unavailable, groups start without health");
            None
        }
    };
    let snapshot: Option<&ClusterHealth> = snapshot.as_deref();

    let groups = vec![
        nodes_group(&ctx, &node_id, snapshot.and_then(ClusterHealth::worst_node_health))?,
        applications_group(
            &ctx,
            &node_id,
            snapshot.and_then(ClusterHealth::worst_application_health),
        )?,
    ];

    let fetched = Fetched::new(groups);
    Ok(match snapshot.and_then(|s| s.aggregated_health_state) {
        Some(health) => fetched.with_health(Some(health)),
        None => fetched,
    })
}

/// Re-read the health snapshot and re-seed the root and every group that
/// has not been expanded. Expanded groups aggregate their own children.
pub(crate) async fn reseed_groups(root: &TreeNode) -> ExplorerResult<()> {
    let Some(key) = root.cache_key().map(ToString::to_string) else {
        return Ok(());
    };
    let ctx = root.context();
    let source = Arc::clone(ctx.source());
    let snapshot = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.cluster_health().await })
        .await?
        .into_value();

    for group in root.loaded_children().unwrap_or_default() {
        if group.is_loaded() {
            continue;
        }
        let health = match group.kind() {
            NodeKind::NodesGroup => snapshot.worst_node_health(),
            NodeKind::ApplicationsGroup => snapshot.worst_application_health(),
            _ => None,
        };
        if let Some(health) = health {
            group.seed_health(health);
        }
    }
    if let Some(health) = snapshot.aggregated_health_state {
        root.seed_health(health);
    }
    tracing::debug!(node = %root.id(), "re-seeded group health from snapshot");
    Ok(())
}

fn root_view(snapshot: &NodeSnapshot<'_>) -> ViewModel {
    ViewModel::new(snapshot.id, snapshot.kind, snapshot.id)
        .with_description("Cluster")
        .with_health(snapshot.aggregate_health())
        .collapsed()
}
