//! Invalidation propagation.

use crate::node::TreeNode;

/// How invalidation treats a node's children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidationPolicy {
    /// Dispose the children and refetch them on the next expansion.
    #[default]
    Destructive,
    /// Keep the child instances and invalidate each of them in place.
    ///
    /// Only applies while Loaded. An Unloaded, Loading or Errored node
    /// behaves destructively.
    Preserving,
}

impl TreeNode {
    /// Mark this node's children stale according to its policy.
    ///
    /// Summary fields are never cleared.
    pub fn invalidate(&self) {
        if self.policy() == InvalidationPolicy::Preserving {
            if let Some(children) = self.preservable_children() {
                tracing::debug!(node = %self.id(), children = children.len(), "invalidating in place");
                for child in &children {
                    child.invalidate();
                }
                return;
            }
        }

        if let Some(children) = self.reset() {
            tracing::debug!(node = %self.id(), children = children.len(), "dropping children");
            for child in &children {
                child.dispose();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TreeContext;
    use crate::node::{Fetched, LoadState, Summary};
    use crate::scheduler::RefreshHandle;
    use crate::view::NodeKind;
    use sfx_cache::DataCache;
    use sfx_core::{FetchError, HealthState};
    use sfx_test_utils::MockClusterSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx() -> TreeContext {
        TreeContext::new(
            Arc::new(MockClusterSource::new()),
            Arc::new(DataCache::default()),
            RefreshHandle::detached(),
        )
    }

    fn counting_group(id: &str, calls: Arc<AtomicUsize>) -> Arc<TreeNode> {
        let leaf_id = format!("{id}/leaf");
        TreeNode::builder(id, NodeKind::NodesGroup, ctx())
            .fetch(move |request| {
                calls.fetch_add(1, Ordering::SeqCst);
                let leaf = TreeNode::builder(leaf_id.clone(), NodeKind::ClusterNode, request.ctx)
                    .summary(Summary::with_health(Some(HealthState::Ok)))
                    .build();
                async move { Ok(Fetched::new(vec![leaf])) }
            })
            .build()
    }

    #[tokio::test]
    async fn test_destructive_drops_children() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = counting_group("g", Arc::clone(&calls));
        let before = group.children().await.unwrap();

        group.invalidate();
        assert!(!group.is_loaded());
        assert_eq!(group.load_state(), LoadState::Unloaded);

        let after = group.children().await.unwrap();
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preserving_keeps_instances() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = counting_group("root/g", Arc::clone(&calls));
        let root = {
            let group = Arc::clone(&group);
            TreeNode::builder("root", NodeKind::Cluster, ctx())
                .policy(InvalidationPolicy::Preserving)
                .fetch(move |_| {
                    let group = Arc::clone(&group);
                    async move { Ok(Fetched::new(vec![group])) }
                })
                .build()
        };
        let groups = root.children().await.unwrap();
        groups[0].children().await;

        root.invalidate();

        assert!(root.is_loaded());
        assert_eq!(root.load_state(), LoadState::Loaded);
        let again = root.children().await.unwrap();
        assert!(Arc::ptr_eq(&groups[0], &again[0]));
        assert!(!again[0].is_loaded());
        assert_eq!(again[0].summary().count, Some(1));
    }

    #[tokio::test]
    async fn test_errored_preserving_node_falls_back_to_destructive() {
        let fail = Arc::new(AtomicUsize::new(1));
        let root = {
            let fail = Arc::clone(&fail);
            TreeNode::builder("root", NodeKind::Cluster, ctx())
                .policy(InvalidationPolicy::Preserving)
                .fetch(move |_| {
                    let failing = fail.swap(0, Ordering::SeqCst) == 1;
                    async move {
                        if failing {
                            Err(FetchError::other("down").into())
                        } else {
                            Ok(Fetched::new(Vec::new()))
                        }
                    }
                })
                .build()
        };
        assert_eq!(root.children().await.unwrap()[0].kind(), NodeKind::Error);

        root.invalidate();
        assert_eq!(root.load_state(), LoadState::Unloaded);
        assert!(root.children().await.unwrap().is_empty());
    }
}
