//! Application hierarchy: application, service, partition, replica.
//!
//! Each level derives its children's context with its own identity and
//! reads through a cache key nested under its parent's.

use std::sync::Arc;

use sfx_cache::CacheKey;
use sfx_core::{
    ApplicationInfo, EntityKind, ExplorerResult, PartitionInfo, ReplicaInfo, ServiceInfo,
    ServiceKind,
};

use crate::context::TreeContext;
use crate::kinds::child_id;
use crate::node::{FetchRequest, Fetched, Summary, TreeNode};
use crate::view::{NodeKind, NodeSnapshot, ViewModel};

/// Application node listing its services.
pub fn application(
    ctx: &TreeContext,
    parent_id: &str,
    info: &ApplicationInfo,
) -> ExplorerResult<Arc<TreeNode>> {
    let ctx = ctx.with_application(info.id.as_str());
    let key = CacheKey::new(EntityKind::Service, ctx.cluster()?).with_parent(info.id.as_str());
    let label = info.name.clone();
    let description = format!("{} {}", info.type_name, info.type_version);

    let node = TreeNode::builder(child_id(parent_id, &info.id), NodeKind::Application, ctx)
        .summary(Summary::with_health(Some(info.health_state)))
        .cache_key(key.clone())
        .fetch(move |request| load_services(request, key.to_string()))
        .view(move |snapshot: &NodeSnapshot<'_>| {
            ViewModel::new(snapshot.id, snapshot.kind, label.as_str())
                .with_description(description.as_str())
                .with_health(snapshot.summary.health)
                .collapsed()
        })
        .build();
    Ok(node)
}

async fn load_services(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let application_id = ctx.application_id()?.to_string();
    let source = Arc::clone(ctx.source());
    let services = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.list_services(&application_id).await })
        .await?
        .into_value();

    let children = services
        .iter()
        .map(|info| service(&ctx, &node_id, info))
        .collect::<ExplorerResult<Vec<_>>>()?;
    Ok(Fetched::new(children).keeping_health())
}

/// Service node listing its partitions.
pub fn service(ctx: &TreeContext, parent_id: &str, info: &ServiceInfo) -> ExplorerResult<Arc<TreeNode>> {
    let application_id = ctx.application_id()?.to_string();
    let ctx = ctx.with_service(info.id.as_str());
    let key = CacheKey::new(EntityKind::Partition, ctx.cluster()?)
        .with_parent(application_id)
        .with_parent(info.id.as_str());
    let label = info.name.clone();
    let description = match info.service_kind {
        ServiceKind::Stateful => format!("{} (stateful)", info.type_name),
        ServiceKind::Stateless => format!("{} (stateless)", info.type_name),
    };

    let node = TreeNode::builder(child_id(parent_id, &info.id), NodeKind::Service, ctx)
        .summary(Summary::with_health(Some(info.health_state)))
        .cache_key(key.clone())
        .fetch(move |request| load_partitions(request, key.to_string()))
        .view(move |snapshot: &NodeSnapshot<'_>| {
            ViewModel::new(snapshot.id, snapshot.kind, label.as_str())
                .with_description(description.as_str())
                .with_health(snapshot.summary.health)
                .collapsed()
        })
        .build();
    Ok(node)
}

async fn load_partitions(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let service_id = ctx.service_id()?.to_string();
    let source = Arc::clone(ctx.source());
    let partitions = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.list_partitions(&service_id).await })
        .await?
        .into_value();

    let children = partitions
        .iter()
        .map(|info| partition(&ctx, &node_id, info))
        .collect::<ExplorerResult<Vec<_>>>()?;
    Ok(Fetched::new(children).keeping_health())
}

/// Partition node listing its replicas.
pub fn partition(
    ctx: &TreeContext,
    parent_id: &str,
    info: &PartitionInfo,
) -> ExplorerResult<Arc<TreeNode>> {
    let partition_id = info.partition_id.to_string();
    let key = CacheKey::new(EntityKind::Replica, ctx.cluster()?)
        .with_parent(ctx.application_id()?)
        .with_parent(ctx.service_id()?)
        .with_parent(partition_id.as_str());
    let ctx = ctx.with_partition(partition_id.as_str());
    let label = partition_id.clone();
    let description = match info.partition_status.as_deref() {
        Some(status) => format!("{} | {status}", info.describe_scheme()),
        None => info.describe_scheme(),
    };

    let node = TreeNode::builder(child_id(parent_id, &partition_id), NodeKind::Partition, ctx)
        .summary(Summary::with_health(Some(info.health_state)))
        .cache_key(key.clone())
        .fetch(move |request| load_replicas(request, key.to_string()))
        .view(move |snapshot: &NodeSnapshot<'_>| {
            ViewModel::new(snapshot.id, snapshot.kind, label.as_str())
                .with_description(description.as_str())
                .with_health(snapshot.summary.health)
                .collapsed()
        })
        .build();
    Ok(node)
}

async fn load_replicas(request: FetchRequest, key: String) -> ExplorerResult<Fetched> {
    let FetchRequest { ctx, node_id } = request;
    let partition_id = ctx.partition_id()?.to_string();
    let source = Arc::clone(ctx.source());
    let replicas = ctx
        .cache()
        .get_or_fetch(&key, || async move { source.list_replicas(&partition_id).await })
        .await?
        .into_value();

    let children = replicas
        .iter()
        .map(|info| replica(&ctx, &node_id, info))
        .collect();
    Ok(Fetched::new(children).keeping_health())
}

/// Replica (or stateless instance) leaf.
pub fn replica(ctx: &TreeContext, parent_id: &str, info: &ReplicaInfo) -> Arc<TreeNode> {
    let label = match info.replica_role.as_deref() {
        Some(role) => format!("{} ({role})", info.node_name),
        None => info.node_name.clone(),
    };
    let description = [info.replica_status.as_deref(), info.address.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" | ");

    TreeNode::builder(child_id(parent_id, &info.id), NodeKind::Replica, ctx.clone())
        .summary(Summary::with_health(Some(info.health_state)))
        .view(move |snapshot: &NodeSnapshot<'_>| {
            ViewModel::new(snapshot.id, snapshot.kind, label.as_str())
                .with_description(description.as_str())
                .with_health(snapshot.summary.health)
        })
        .build()
}
