//! Lazy-loading cluster explorer tree.
//!
//! The renderer asks a [`TreeNode`] for its children. A loaded node answers
//! from memory, anything else fetches through the session's data cache and
//! moves through the load states in [`node`]. Invalidation flows top-down
//! according to each node's [`InvalidationPolicy`], and every repaint is
//! requested through the debounced [`RefreshScheduler`].
//!
//! [`ExplorerSession`] wires these together for one cluster.

pub mod context;
pub mod kinds;
pub mod node;
pub mod policy;
pub mod scheduler;
pub mod session;
pub mod view;

pub use context::{ContextOverrides, TreeContext};
pub use node::{FetchRequest, Fetched, HealthUpdate, LoadState, NodeBuilder, Summary, TreeNode};
pub use policy::InvalidationPolicy;
pub use scheduler::{
    AutoRefreshCallback, RefreshEvent, RefreshHandle, RefreshScheduler, SchedulerConfig,
};
pub use session::{ExplorerSession, SessionSettings};
pub use view::{Collapsible, NodeKind, NodeSnapshot, ViewModel};
