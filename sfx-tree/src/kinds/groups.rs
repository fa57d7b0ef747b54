//! Collection groups under the cluster root.
//!
//! Groups are protected: a refresh aimed at one always repaints the whole
//! tree, since its count and health show up in the root as well.

use std::sync::Arc;

use sfx_cache::CacheKey;
use sfx_core::{EntityKind, ExplorerResult, HealthState};

use crate::context::TreeContext;
use crate::kinds::{application, child_id, cluster_node};
use crate::node::{FetchRequest, Fetched, Summary, TreeNode};
use crate::view::{NodeKind, NodeSnapshot, ViewModel};

/// Protected group listing the cluster's nodes.
pub fn nodes_group(
    ctx: &TreeContext,
    parent_id: &str,
    seed_health: Option<HealthState>,
) -> ExplorerResult<Arc<TreeNode>> {
    let key = CacheKey::new(EntityKind::Node, ctx.cluster()?);
    let node = TreeNode::builder(child_id(parent_id, "nodes"), NodeKind::NodesGroup, ctx.clone())
        .protected(true)
        .summary(Summary::with_health(seed_health))
        .cache_key(key.clone())
        .fetch(move |request| load_nodes(request, key.to_string()))
        .view(|snapshot| group_view(snapshot, "Nodes"))
        .build();
    Ok(node)
}

/// Protected group listing the cluster's applications.
pub fn applications_group(
    ctx: &TreeContext,
    parent_id: &str,
    seed_health: Option<HealthState>,
) -> ExplorerResult<Arc<TreeNode>> {
    let key = CacheKey::new(EntityKind::Application, ctx.cluster()?);
    let node = TreeNode::builder(
        child_id(parent_id, "applications"),
        NodeKind::ApplicationsGroup,
        ctx.clone(),
    )
    .protected(true)
    .summary(Summary::with_health(seed_health))
    .cache_key(key.clone())
    .fetch(move |request| load_applications(request, key.to_string()))
    .view(|snapshot| group_view(snapshot, "Applications"))
    .build();
    Ok(node)
}

async fn load_nodes(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let source = Arc::clone(ctx.source());
    let nodes = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.list_nodes().await })
        .await?
        .into_value();

    let children = nodes
        .iter()
        .map(|info| cluster_node(&ctx, &node_id, info))
        .collect();
    Ok(Fetched::new(children))
}

async fn load_applications(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let source = Arc::clone(ctx.source());
    let applications = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.list_applications().await })
        .await?
        .into_value();

    let children = applications
        .iter()
        .map(|info| application(&ctx, &node_id, info))
        .collect::<ExplorerResult<Vec<_>>>()?;
    Ok(Fetched::new(children))
}

fn group_view(snapshot: &NodeSnapshot<'_>, title: &str) -> ViewModel {
    ViewModel::new(snapshot.id, snapshot.kind, snapshot.counted_label(title))
        .with_health(snapshot.aggregate_health())
        .collapsed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RefreshHandle;
    use sfx_cache::DataCache;
    use sfx_test_utils::{fixtures, MockClusterSource};

    #[tokio::test]
    async fn test_nodes_group_reads_through_cache() {
        let source = Arc::new(MockClusterSource::new().with_nodes(vec![
            fixtures::node("_Node_0", HealthState::Ok),
            fixtures::node("_Node_1", HealthState::Warning),
        ]));
        let cache = Arc::new(DataCache::default());
        let ctx = TreeContext::new(source.clone(), Arc::clone(&cache), RefreshHandle::detached())
            .with_cluster("c1");
        let group = nodes_group(&ctx, "c1", None).unwrap();

        let children = group.children().await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].id(), "c1/nodes/_Node_1");
        assert!(children[1].is_leaf());
        assert!(cache.has("nodes:c1"));

        let view = group.view();
        assert_eq!(view.label, "Nodes (2)");
        assert_eq!(view.health, Some(HealthState::Warning));

        group.invalidate();
        group.children().await;
        assert_eq!(source.calls().list_nodes, 1, "second load served from cache");
    }

    #[tokio::test]
    async fn test_empty_applications_group() {
        let source = Arc::new(MockClusterSource::new());
        let ctx = TreeContext::new(source, Arc::new(DataCache::default()), RefreshHandle::detached())
            .with_cluster("c1");
        let group = applications_group(&ctx, "c1", Some(HealthState::Ok)).unwrap();

        assert!(group.children().await.unwrap().is_empty());
        assert!(group.is_loaded());
        assert_eq!(group.view().label, "Applications (0)");
        assert_eq!(group.summary().health, None);
    }
}
