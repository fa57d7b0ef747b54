//! Refresh scheduling.
//!
//! All renderer notifications go through [`RefreshScheduler`]:
//!
//! - **Debounce**: requests within one window (default 100ms) coalesce into
//!   a single notification. The window is trailing, each request re-arms it.
//! - **Promotion**: a full-tree request, a request for a protected node, or
//!   requests for two different nodes in one window notify the full tree.
//! - **Auto-refresh**: a periodic tick (default 30s) runs a callback that
//!   invalidates the cache and root, then notifies the full tree. A failing
//!   or panicking tick is logged and the timer keeps going.
//!
//! Notifications arrive on the [`RefreshEvent`] receiver returned by
//! [`RefreshScheduler::new`]. Timers are aborted by
//! [`RefreshScheduler::shutdown`] or when the last scheduler handle drops.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sfx_core::config::{DEFAULT_AUTO_REFRESH_INTERVAL_MS, DEFAULT_DEBOUNCE_MS};
use sfx_core::{ExplorerResult, RefreshSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use crate::node::TreeNode;

/// Buffered notifications before senders wait on the renderer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A renderer notification.
#[derive(Clone)]
pub enum RefreshEvent {
    /// Re-render this node and its subtree.
    Node(Arc<TreeNode>),
    /// Re-render everything.
    FullTree,
}

impl RefreshEvent {
    /// Whether the whole tree should be re-rendered.
    pub fn is_full_tree(&self) -> bool {
        matches!(self, RefreshEvent::FullTree)
    }
}

impl fmt::Debug for RefreshEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshEvent::Node(node) => f.debug_tuple("Node").field(&node.id()).finish(),
            RefreshEvent::FullTree => f.write_str("FullTree"),
        }
    }
}

/// Work run at every auto-refresh tick before the full-tree notification.
pub type AutoRefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, ExplorerResult<()>> + Send + Sync>;

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub debounce: Duration,
    pub auto_refresh_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            auto_refresh_interval: Duration::from_millis(DEFAULT_AUTO_REFRESH_INTERVAL_MS),
        }
    }
}

impl SchedulerConfig {
    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Override the auto-refresh period.
    pub fn with_auto_refresh_interval(mut self, interval: Duration) -> Self {
        self.auto_refresh_interval = interval;
        self
    }
}

impl From<&RefreshSettings> for SchedulerConfig {
    fn from(settings: &RefreshSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            auto_refresh_interval: settings.interval(),
        }
    }
}

/// Requests accumulated in the current debounce window.
enum Batch {
    Node(Arc<TreeNode>),
    FullTree,
}

impl Batch {
    fn merge(self, other: Batch) -> Batch {
        match (self, other) {
            (Batch::Node(a), Batch::Node(b)) if Arc::ptr_eq(&a, &b) => Batch::Node(a),
            _ => Batch::FullTree,
        }
    }

    fn into_event(self) -> RefreshEvent {
        match self {
            Batch::Node(node) => RefreshEvent::Node(node),
            Batch::FullTree => RefreshEvent::FullTree,
        }
    }
}

#[derive(Default)]
struct Pending {
    batch: Option<Batch>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Inner {
    config: SchedulerConfig,
    events: mpsc::Sender<RefreshEvent>,
    pending: Mutex<Pending>,
    auto_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn auto_refresh(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.auto_refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver the batch armed under `generation`, unless a later request
    /// re-armed the window.
    async fn flush(&self, generation: u64) {
        let batch = {
            let mut pending = self.pending();
            if pending.generation != generation {
                return;
            }
            pending.timer = None;
            pending.batch.take()
        };
        if let Some(batch) = batch {
            self.notify(batch.into_event()).await;
        }
    }

    async fn notify(&self, event: RefreshEvent) {
        tracing::debug!(?event, "refresh notification");
        if self.events.send(event).await.is_err() {
            tracing::debug!("refresh receiver dropped, notification discarded");
        }
    }

    async fn tick(&self, callback: &AutoRefreshCallback) {
        let run = async { callback().await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => tracing::debug!("auto-refresh tick invalidated tree"),
            Ok(Err(e)) => tracing::warn!(error = %e, "auto-refresh tick failed"),
            Err(_) => tracing::error!("auto-refresh tick panicked"),
        }
        self.notify(RefreshEvent::FullTree).await;
    }

    fn cancel_pending(&self) {
        let mut pending = self.pending();
        pending.generation += 1;
        pending.batch = None;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
    }

    fn stop_auto_refresh(&self) -> bool {
        match self.auto_refresh().take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_pending();
        self.stop_auto_refresh();
    }
}

/// Debounced refresh scheduler. Cheap to clone; clones share state.
///
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.inner.config)
            .field("auto_refresh_running", &self.is_auto_refresh_running())
            .finish()
    }
}

impl RefreshScheduler {
    /// Scheduler plus the receiver its notifications arrive on.
    pub fn new(config: SchedulerConfig) -> (Self, mpsc::Receiver<RefreshEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Inner {
            config,
            events,
            pending: Mutex::new(Pending::default()),
            auto_refresh: Mutex::new(None),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    /// Timing this scheduler runs with.
    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Schedule a notification for `node`, or for the full tree when `None`.
    pub fn refresh(&self, node: Option<Arc<TreeNode>>) {
        let request = match node {
            None => Batch::FullTree,
            Some(node) if node.is_protected() => {
                tracing::debug!(node = %node.id(), "protected node, promoting to full tree");
                Batch::FullTree
            }
            Some(node) => Batch::Node(node),
        };

        let mut pending = self.inner.pending();
        let batch = match pending.batch.take() {
            Some(batch) => batch.merge(request),
            None => request,
        };
        pending.batch = Some(batch);
        pending.generation += 1;
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }

        let generation = pending.generation;
        let deadline = Instant::now() + self.inner.config.debounce;
        let weak = Arc::downgrade(&self.inner);
        pending.timer = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.flush(generation).await;
            }
        }));
    }

    /// Weak callback for contexts. Requests are dropped once the scheduler
    /// is gone.
    pub fn refresh_handle(&self) -> RefreshHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        RefreshHandle::from_fn(move |node| {
            if let Some(inner) = weak.upgrade() {
                RefreshScheduler { inner }.refresh(node);
            }
        })
    }

    /// Start the periodic auto-refresh. Returns false if already running.
    ///
    /// The first tick fires one full interval after the call.
    pub fn start_auto_refresh(&self, callback: AutoRefreshCallback) -> bool {
        let mut slot = self.inner.auto_refresh();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("auto-refresh already running");
            return false;
        }

        let period = self.inner.config.auto_refresh_interval;
        let first_tick = Instant::now() + period;
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.tick(&callback).await;
            }
        }));
        tracing::info!(interval_ms = period.as_millis() as u64, "auto-refresh started");
        true
    }

    /// Stop the periodic auto-refresh. Returns whether it was running.
    pub fn stop_auto_refresh(&self) -> bool {
        let stopped = self.inner.stop_auto_refresh();
        if stopped {
            tracing::info!("auto-refresh stopped");
        }
        stopped
    }

    /// Stop any running auto-refresh and start again with `callback`.
    pub fn restart_auto_refresh(&self, callback: AutoRefreshCallback) -> bool {
        self.stop_auto_refresh();
        self.start_auto_refresh(callback)
    }

    /// Whether the periodic tick is active.
    pub fn is_auto_refresh_running(&self) -> bool {
        self.inner
            .auto_refresh()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancel the pending notification and the auto-refresh timer.
    pub fn shutdown(&self) {
        self.inner.cancel_pending();
        self.stop_auto_refresh();
    }
}

/// Cloneable targeted-refresh callback carried by tree contexts.
#[derive(Clone)]
pub struct RefreshHandle {
    request: Arc<dyn Fn(Option<Arc<TreeNode>>) + Send + Sync>,
}

impl RefreshHandle {
    /// Handle forwarding every request to `request`.
    pub fn from_fn<F>(request: F) -> Self
    where
        F: Fn(Option<Arc<TreeNode>>) + Send + Sync + 'static,
    {
        Self {
            request: Arc::new(request),
        }
    }

    /// A handle that ignores every request.
    pub fn detached() -> Self {
        Self::from_fn(|_| {})
    }

    /// Ask for a refresh of `node`, or of the full tree when `None`.
    pub fn request(&self, node: Option<Arc<TreeNode>>) {
        (self.request)(node);
    }
}

impl fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshHandle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TreeContext;
    use crate::view::NodeKind;
    use sfx_cache::DataCache;
    use sfx_core::{ExplorerError, FetchError};
    use sfx_test_utils::MockClusterSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(id: &str, protected: bool) -> Arc<TreeNode> {
        let ctx = TreeContext::new(
            Arc::new(MockClusterSource::new()),
            Arc::new(DataCache::default()),
            RefreshHandle::detached(),
        );
        TreeNode::builder(id, NodeKind::Application, ctx)
            .protected(protected)
            .build()
    }

    fn scheduler() -> (RefreshScheduler, mpsc::Receiver<RefreshEvent>) {
        RefreshScheduler::new(SchedulerConfig::default())
    }

    async fn settle(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_node_request_notifies_that_node() {
        let (scheduler, mut events) = scheduler();
        let target = node("c/App", false);
        scheduler.refresh(Some(Arc::clone(&target)));

        settle(99).await;
        assert!(events.try_recv().is_err());
        settle(1).await;

        match events.recv().await {
            Some(RefreshEvent::Node(n)) => assert!(Arc::ptr_eq(&n, &target)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_node_twice_stays_targeted() {
        let (scheduler, mut events) = scheduler();
        let target = node("c/App", false);
        scheduler.refresh(Some(Arc::clone(&target)));
        scheduler.refresh(Some(Arc::clone(&target)));
        settle(100).await;

        assert!(matches!(events.recv().await, Some(RefreshEvent::Node(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_nodes_promote_to_full_tree() {
        let (scheduler, mut events) = scheduler();
        scheduler.refresh(Some(node("c/A", false)));
        scheduler.refresh(Some(node("c/B", false)));
        settle(100).await;

        assert!(events.recv().await.unwrap().is_full_tree());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_is_trailing() {
        let (scheduler, mut events) = scheduler();
        scheduler.refresh(None);
        settle(80).await;
        scheduler.refresh(None);
        settle(80).await;
        assert!(events.try_recv().is_err(), "window re-armed by second request");

        settle(20).await;
        assert!(events.recv().await.unwrap().is_full_tree());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let (scheduler, mut events) = scheduler();
        scheduler.refresh(None);
        scheduler.shutdown();
        settle(500).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_tick_keeps_timer_running() {
        let (scheduler, mut events) = scheduler();
        let calls = Arc::new(AtomicUsize::new(0));
        let callback: AutoRefreshCallback = {
            let calls = Arc::clone(&calls);
            Arc::new(move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(ExplorerError::from(FetchError::other("cache unavailable"))),
                        1 => panic!("tick exploded"),
                        _ => Ok(()),
                    }
                }
                .boxed()
            })
        };

        assert!(scheduler.start_auto_refresh(Arc::clone(&callback)));
        assert!(!scheduler.start_auto_refresh(callback), "start is idempotent");

        for expected in 1..=3 {
            settle(30_000).await;
            assert!(events.recv().await.unwrap().is_full_tree());
            assert_eq!(calls.load(Ordering::SeqCst), expected);
        }
        assert!(scheduler.is_auto_refresh_running());

        assert!(scheduler.stop_auto_refresh());
        assert!(!scheduler.is_auto_refresh_running());
        settle(60_000).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_outliving_scheduler_is_inert() {
        let (scheduler, mut events) = scheduler();
        let handle = scheduler.refresh_handle();
        drop(scheduler);
        handle.request(None);
        settle(200).await;
        assert!(events.recv().await.is_none(), "sender dropped with scheduler");
    }
}
