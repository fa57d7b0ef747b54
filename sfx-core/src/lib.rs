//! Cluster explorer core - records, health and errors
//!
//! Pure data structures shared by every other crate in the workspace:
//! the remote entity records, the health aggregator, the error taxonomy,
//! configuration, and the data-access contract nodes fetch through.

pub mod config;
pub mod entities;
pub mod error;
pub mod health;
pub mod source;

pub use config::{CacheSettings, ClusterConfig, ExplorerConfig, RefreshSettings, RenderSettings};
pub use entities::{
    ApplicationInfo, ClusterHealth, EntityHealthState, EntityKind, NodeInfo, PartitionInfo,
    PartitionScheme, ReplicaInfo, ServiceInfo, ServiceKind,
};
pub use error::{ConfigError, ContextError, ExplorerError, ExplorerResult, FetchError};
pub use health::{worst, HealthState};
pub use source::ClusterDataSource;
