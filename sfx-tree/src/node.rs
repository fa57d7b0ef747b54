//! Generic tree node: load state, fetch deduplication and error wrapping.
//!
//! Every kind of node in the explorer is a [`TreeNode`] configured with a
//! fetch function, a view function, an invalidation policy and a protected
//! flag (see [`crate::kinds`]).
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded --children()--> Loading --ok--> Loaded
//!                                  \--err--> Errored (one error child)
//! Loaded | Errored --invalidate()--> Unloaded
//! ```
//!
//! Concurrent `children()` calls while Loading all await the same shared
//! future. The in-flight slot is cleared when the fetch settles, whatever the
//! outcome, so a node never has more than one fetch outstanding.
//!
//! Invalidation bumps the node's fetch epoch but leaves a running fetch in
//! place. That fetch cannot commit its now stale children. A caller arriving
//! after the invalidation waits for it to settle and then starts the single
//! replacement fetch.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use sfx_cache::CacheKey;
use sfx_core::{worst, ExplorerResult, FetchError, HealthState};

use crate::context::TreeContext;
use crate::policy::InvalidationPolicy;
use crate::view::{NodeKind, NodeSnapshot, ViewModel};

/// Future returned by a node fetch.
pub type FetchFuture = BoxFuture<'static, ExplorerResult<Fetched>>;
/// Loads a node's children from its request.
pub type FetchFn = Arc<dyn Fn(FetchRequest) -> FetchFuture + Send + Sync>;
/// Projects a node snapshot to display data.
pub type ViewFn = Arc<dyn Fn(&NodeSnapshot<'_>) -> ViewModel + Send + Sync>;

type SharedChildren = Shared<BoxFuture<'static, Vec<Arc<TreeNode>>>>;

/// Node load state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Errored,
}

/// Locally cached summary fields, rendered before and between fetches.
///
/// Invalidation never clears these. Only the next successful fetch
/// overwrites them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub count: Option<usize>,
    pub health: Option<HealthState>,
}

impl Summary {
    /// Summary with a known health and no count yet.
    pub fn with_health(health: Option<HealthState>) -> Self {
        Self {
            count: None,
            health,
        }
    }
}

/// Everything a fetch function gets to work with.
pub struct FetchRequest {
    pub ctx: TreeContext,
    pub node_id: String,
}

/// How a successful fetch updates the node's cached health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthUpdate {
    /// Worst summary health of the fetched children.
    Aggregate,
    /// Leave the cached health as it is.
    Keep,
    Set(Option<HealthState>),
}

/// Result of a successful fetch.
pub struct Fetched {
    pub children: Vec<Arc<TreeNode>>,
    pub health: HealthUpdate,
}

impl Fetched {
    /// Children whose worst health becomes the node's health.
    pub fn new(children: Vec<Arc<TreeNode>>) -> Self {
        Self {
            children,
            health: HealthUpdate::Aggregate,
        }
    }

    /// Keep the health the node already reports for itself.
    pub fn keeping_health(mut self) -> Self {
        self.health = HealthUpdate::Keep;
        self
    }

    /// Replace the node's health with `health`.
    pub fn with_health(mut self, health: Option<HealthState>) -> Self {
        self.health = HealthUpdate::Set(health);
        self
    }
}

/// The outstanding fetch and the epoch it was started under.
struct InFlight {
    epoch: u64,
    children: SharedChildren,
}

struct NodeState {
    load: LoadState,
    children: Option<Vec<Arc<TreeNode>>>,
    in_flight: Option<InFlight>,
    summary: Summary,
    error: Option<String>,
    epoch: u64,
}

/// A node in the explorer tree.
pub struct TreeNode {
    id: String,
    kind: NodeKind,
    policy: InvalidationPolicy,
    protected: bool,
    cache_key: Option<CacheKey>,
    ctx: TreeContext,
    fetch: Option<FetchFn>,
    view: ViewFn,
    retry_target: Option<Weak<TreeNode>>,
    state: Mutex<NodeState>,
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .field("protected", &self.protected)
            .field("load", &self.load_state())
            .finish_non_exhaustive()
    }
}

impl TreeNode {
    /// Start configuring a node. Without a fetch function it is a leaf.
    pub fn builder(id: impl Into<String>, kind: NodeKind, ctx: TreeContext) -> NodeBuilder {
        NodeBuilder {
            id: id.into(),
            kind,
            ctx,
            policy: InvalidationPolicy::Destructive,
            protected: false,
            cache_key: None,
            fetch: None,
            view: None,
            summary: Summary::default(),
        }
    }

    /// Stable path-like identity, e.g. `c1/apps/App`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// What this node displays.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// How [`TreeNode::invalidate`] treats the children.
    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    /// Refresh requests targeting a protected node are promoted to a
    /// full-tree refresh.
    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// A leaf has no fetch function and answers `None` for children.
    pub fn is_leaf(&self) -> bool {
        self.fetch.is_none()
    }

    /// Context this node was built with and hands to its fetch.
    pub fn context(&self) -> &TreeContext {
        &self.ctx
    }

    /// Cache scope this node's fetch reads through, if any.
    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True iff the children list is populated (possibly empty, possibly a
    /// single error placeholder).
    pub fn is_loaded(&self) -> bool {
        self.state().children.is_some()
    }

    /// Current position in the load lifecycle.
    pub fn load_state(&self) -> LoadState {
        self.state().load
    }

    /// Cached count and health, kept across invalidation.
    pub fn summary(&self) -> Summary {
        self.state().summary
    }

    /// Message of the last failed fetch while Errored.
    pub fn error_message(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Children currently held, without fetching.
    pub fn loaded_children(&self) -> Option<Vec<Arc<TreeNode>>> {
        self.state().children.clone()
    }

    /// Synchronous display projection. Never fetches.
    pub fn view(&self) -> ViewModel {
        let state = self.state();
        let snapshot = NodeSnapshot {
            id: &self.id,
            kind: self.kind,
            load: state.load,
            summary: state.summary,
            children: state.children.as_deref(),
            error: state.error.as_deref(),
        };
        (self.view)(&snapshot)
    }

    /// Children of this node, fetching them if needed.
    ///
    /// Returns `None` for leaves. Fetch failures are never surfaced: the
    /// caller receives a single error placeholder instead.
    pub async fn children(self: &Arc<Self>) -> Option<Vec<Arc<TreeNode>>> {
        let fetch = self.fetch.as_ref()?;
        loop {
            let (pending, current) = {
                let mut state = self.state();
                if matches!(state.load, LoadState::Loaded | LoadState::Errored) {
                    return Some(state.children.clone().unwrap_or_default());
                }
                let joined = state
                    .in_flight
                    .as_ref()
                    .map(|f| (f.children.clone(), f.epoch == state.epoch));
                match joined {
                    Some((pending, current)) => {
                        tracing::trace!(node = %self.id, current, "joining in-flight fetch");
                        (pending, current)
                    }
                    None => (self.begin_fetch(&mut state, fetch), true),
                }
            };
            let children = pending.await;
            if current {
                return Some(children);
            }
            // Started before the last invalidation: wait it out, then look again.
        }
    }

    fn begin_fetch(self: &Arc<Self>, state: &mut NodeState, fetch: &FetchFn) -> SharedChildren {
        let epoch = state.epoch;
        let fetch = Arc::clone(fetch);
        let request = FetchRequest {
            ctx: self.ctx.clone(),
            node_id: self.id.clone(),
        };
        let node_id = self.id.clone();
        let weak = Arc::downgrade(self);

        let pending = async move {
            let outcome = match AssertUnwindSafe(async move { fetch(request).await })
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(node = %node_id, "fetch panicked");
                    Err(FetchError::Panicked { node: node_id }.into())
                }
            };
            match weak.upgrade() {
                Some(node) => node.commit(epoch, outcome),
                None => Vec::new(),
            }
        }
        .boxed()
        .shared();

        tracing::debug!(node = %self.id, epoch, "fetching children");
        state.load = LoadState::Loading;
        state.in_flight = Some(InFlight {
            epoch,
            children: pending.clone(),
        });
        pending
    }

    /// Empty the in-flight slot if it still holds the fetch from `epoch`.
    fn settle(state: &mut NodeState, epoch: u64) {
        if state.in_flight.as_ref().is_some_and(|f| f.epoch == epoch) {
            state.in_flight = None;
        }
    }

    fn commit(self: &Arc<Self>, epoch: u64, outcome: ExplorerResult<Fetched>) -> Vec<Arc<TreeNode>> {
        match outcome {
            Ok(fetched) => {
                let children = fetched.children;
                let health = match fetched.health {
                    HealthUpdate::Aggregate => {
                        Some(worst(children.iter().map(|child| child.summary().health)))
                    }
                    HealthUpdate::Keep => None,
                    HealthUpdate::Set(health) => Some(health),
                };

                let mut state = self.state();
                Self::settle(&mut state, epoch);
                if state.epoch != epoch {
                    tracing::debug!(node = %self.id, epoch, "discarding fetch started before invalidation");
                    return children;
                }
                state.load = LoadState::Loaded;
                state.error = None;
                state.summary.count = Some(children.len());
                if let Some(health) = health {
                    state.summary.health = health;
                }
                state.children = Some(children.clone());
                tracing::debug!(node = %self.id, count = children.len(), "children loaded");
                children
            }
            Err(err) => {
                let message = err.user_message();
                let placeholder = self.error_placeholder(&message);

                let mut state = self.state();
                Self::settle(&mut state, epoch);
                if state.epoch != epoch {
                    tracing::debug!(node = %self.id, epoch, "discarding failure of superseded fetch");
                    return vec![placeholder];
                }
                tracing::warn!(node = %self.id, error = %message, "fetch failed");
                state.load = LoadState::Errored;
                state.error = Some(message);
                state.children = Some(vec![Arc::clone(&placeholder)]);
                vec![placeholder]
            }
        }
    }

    fn error_placeholder(self: &Arc<Self>, message: &str) -> Arc<TreeNode> {
        let label = format!("Error: {message}");
        let mut node = TreeNode::builder(
            format!("{}/error", self.id),
            NodeKind::Error,
            self.ctx.clone(),
        )
        .view(move |snapshot| {
            ViewModel::new(snapshot.id, snapshot.kind, label.clone()).retryable()
        })
        .build_node();
        node.retry_target = Some(Arc::downgrade(self));
        Arc::new(node)
    }

    /// Retry affordance of an error placeholder: invalidate the failed
    /// parent and ask for a targeted refresh of it.
    ///
    /// Returns false when this node is not a placeholder or its parent is
    /// gone.
    pub fn retry(&self) -> bool {
        let Some(parent) = self.retry_target.as_ref().and_then(Weak::upgrade) else {
            return false;
        };
        tracing::debug!(node = %parent.id, "retrying failed fetch");
        parent.invalidate();
        parent.ctx.request_refresh(Some(Arc::clone(&parent)));
        true
    }

    /// Release this node's children recursively and return to Unloaded.
    ///
    /// Summary fields survive.
    pub fn dispose(&self) {
        if let Some(children) = self.reset() {
            for child in &children {
                child.dispose();
            }
        }
    }

    /// Overwrite the cached summary health, e.g. from a fresh snapshot.
    pub(crate) fn seed_health(&self, health: HealthState) {
        self.state().summary.health = Some(health);
    }

    /// Children to invalidate in place, present only while Loaded.
    pub(crate) fn preservable_children(&self) -> Option<Vec<Arc<TreeNode>>> {
        let state = self.state();
        match state.load {
            LoadState::Loaded => state.children.clone(),
            _ => None,
        }
    }

    /// Return to Unloaded and hand back the held children. A running fetch
    /// stays in its slot but can no longer commit.
    pub(crate) fn reset(&self) -> Option<Vec<Arc<TreeNode>>> {
        let mut state = self.state();
        state.epoch += 1;
        state.load = LoadState::Unloaded;
        state.error = None;
        state.children.take()
    }
}

/// Builder for [`TreeNode`].
pub struct NodeBuilder {
    id: String,
    kind: NodeKind,
    ctx: TreeContext,
    policy: InvalidationPolicy,
    protected: bool,
    cache_key: Option<CacheKey>,
    fetch: Option<FetchFn>,
    view: Option<ViewFn>,
    summary: Summary,
}

impl NodeBuilder {
    /// Invalidation policy. Defaults to [`InvalidationPolicy::Destructive`].
    pub fn policy(mut self, policy: InvalidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Promote refresh requests for this node to a full-tree refresh.
    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    /// Cache scope evicted when this node is refreshed.
    pub fn cache_key(mut self, key: CacheKey) -> Self {
        self.cache_key = Some(key);
        self
    }

    /// Seed summary fields, e.g. health from a coarse snapshot.
    pub fn summary(mut self, summary: Summary) -> Self {
        self.summary = summary;
        self
    }

    /// Make this a container node loading its children with `fetch`.
    pub fn fetch<F, Fut>(mut self, fetch: F) -> Self
    where
        F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExplorerResult<Fetched>> + Send + 'static,
    {
        self.fetch = Some(Arc::new(move |request: FetchRequest| fetch(request).boxed()));
        self
    }

    /// Display projection. Defaults to the id as label plus aggregate health.
    pub fn view<F>(mut self, view: F) -> Self
    where
        F: Fn(&NodeSnapshot<'_>) -> ViewModel + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(view));
        self
    }

    fn build_node(self) -> TreeNode {
        let view: ViewFn = match self.view {
            Some(view) => view,
            None => Arc::new(default_view),
        };
        TreeNode {
            id: self.id,
            kind: self.kind,
            policy: self.policy,
            protected: self.protected,
            cache_key: self.cache_key,
            ctx: self.ctx,
            fetch: self.fetch,
            view,
            retry_target: None,
            state: Mutex::new(NodeState {
                load: LoadState::Unloaded,
                children: None,
                in_flight: None,
                summary: self.summary,
                error: None,
                epoch: 0,
            }),
        }
    }

    /// Finish the node in the Unloaded state.
    pub fn build(self) -> Arc<TreeNode> {
        Arc::new(self.build_node())
    }
}

fn default_view(snapshot: &NodeSnapshot<'_>) -> ViewModel {
    let view = ViewModel::new(snapshot.id, snapshot.kind, snapshot.id)
        .with_health(snapshot.aggregate_health());
    if snapshot.children.is_some() || snapshot.load != LoadState::Loaded {
        view.collapsed()
    } else {
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RefreshHandle;
    use sfx_cache::DataCache;
    use sfx_test_utils::MockClusterSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    fn ctx() -> TreeContext {
        TreeContext::new(
            Arc::new(MockClusterSource::new()),
            Arc::new(DataCache::default()),
            RefreshHandle::detached(),
        )
        .with_cluster("c1")
    }

    fn leaf(id: &str, health: HealthState) -> Arc<TreeNode> {
        TreeNode::builder(id, NodeKind::Replica, ctx())
            .summary(Summary::with_health(Some(health)))
            .build()
    }

    #[tokio::test]
    async fn test_leaf_has_no_children() {
        let node = leaf("c1/r", HealthState::Ok);
        assert!(node.is_leaf());
        assert!(node.children().await.is_none());
        assert!(!node.is_loaded());
    }

    #[tokio::test]
    async fn test_concurrent_children_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let node = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            TreeNode::builder("c1/g", NodeKind::NodesGroup, ctx())
                .fetch(move |_| {
                    let calls = Arc::clone(&calls);
                    let gate = Arc::clone(&gate);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _permit = gate.acquire().await;
                        Ok(Fetched::new(vec![leaf("c1/g/a", HealthState::Warning)]))
                    }
                })
                .build()
        };

        let (first, second, ()) = tokio::join!(node.children(), node.children(), async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(node.load_state(), LoadState::Loaded);
        assert_eq!(
            node.summary(),
            Summary {
                count: Some(1),
                health: Some(HealthState::Warning)
            }
        );
    }

    #[tokio::test]
    async fn test_failure_becomes_error_child() {
        let node = TreeNode::builder("c1/apps", NodeKind::ApplicationsGroup, ctx())
            .fetch(|_| async { Err(FetchError::other("boom").into()) })
            .build();

        let children = node.children().await.unwrap();
        assert_eq!(children.len(), 1);
        let view = children[0].view();
        assert_eq!(view.label, "Error: boom");
        assert_eq!(view.kind, NodeKind::Error);
        assert!(view.retryable);
        assert_eq!(node.load_state(), LoadState::Errored);
        assert!(node.is_loaded());
        assert_eq!(node.error_message().as_deref(), Some("boom"));

        let again = node.children().await.unwrap();
        assert!(Arc::ptr_eq(&children[0], &again[0]), "errored nodes do not retry on their own");
    }

    #[tokio::test]
    async fn test_panicking_fetch_releases_in_flight_slot() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let node = {
            let attempts = Arc::clone(&attempts);
            TreeNode::builder("c1/p", NodeKind::Partition, ctx())
                .fetch(move |_| {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 0 {
                            panic!("fetch exploded");
                        }
                        Ok(Fetched::new(Vec::new()))
                    }
                })
                .build()
        };

        let children = node.children().await.unwrap();
        assert_eq!(children[0].kind(), NodeKind::Error);
        assert!(children[0].view().label.contains("panicked"));

        assert!(children[0].retry());
        assert_eq!(node.load_state(), LoadState::Unloaded);
        assert_eq!(node.children().await.unwrap().len(), 0);
        assert_eq!(node.load_state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_commit_after_invalidation() {
        let gate = Arc::new(Semaphore::new(0));
        let node = {
            let gate = Arc::clone(&gate);
            TreeNode::builder("c1/svc", NodeKind::Service, ctx())
                .fetch(move |_| {
                    let gate = Arc::clone(&gate);
                    async move {
                        let _permit = gate.acquire().await;
                        Ok(Fetched::new(vec![leaf("c1/svc/p", HealthState::Ok)]))
                    }
                })
                .build()
        };

        let (children, ()) = tokio::join!(node.children(), async {
            tokio::task::yield_now().await;
            node.invalidate();
            gate.add_permits(1);
        });

        assert_eq!(children.unwrap().len(), 1, "the original caller still resolves");
        assert_eq!(node.load_state(), LoadState::Unloaded);
        assert!(!node.is_loaded());
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_waits_for_it_before_refetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let node = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            TreeNode::builder("c1/svc", NodeKind::Service, ctx())
                .fetch(move |_| {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst);
                    let gate = Arc::clone(&gate);
                    async move {
                        let _permit = gate.acquire().await;
                        let child = leaf(&format!("c1/svc/{attempt}"), HealthState::Ok);
                        Ok(Fetched::new(vec![child]))
                    }
                })
                .build()
        };

        let later = || async {
            for _ in 0..2 {
                tokio::task::yield_now().await;
            }
            node.children().await
        };

        let (first, second, third, ()) = tokio::join!(node.children(), later(), later(), async {
            node.invalidate();
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            assert_eq!(calls.load(Ordering::SeqCst), 1, "invalidation does not start a second fetch");
            gate.add_permits(1);
            while calls.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
            gate.add_permits(1);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.unwrap()[0].id(), "c1/svc/0");
        let (second, third) = (second.unwrap(), third.unwrap());
        assert_eq!(second[0].id(), "c1/svc/1");
        assert!(Arc::ptr_eq(&second[0], &third[0]), "late callers share the replacement fetch");
        assert_eq!(node.load_state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_dispose_keeps_summary() {
        let node = TreeNode::builder("c1/g", NodeKind::NodesGroup, ctx())
            .fetch(|_| async { Ok(Fetched::new(vec![leaf("c1/g/n", HealthState::Error)])) })
            .build();
        node.children().await;
        node.dispose();

        assert!(!node.is_loaded());
        assert_eq!(node.summary().count, Some(1));
        assert_eq!(node.summary().health, Some(HealthState::Error));
    }

    #[test]
    fn test_retry_on_regular_node_is_noop() {
        assert!(!leaf("c1/r", HealthState::Ok).retry());
    }
}
