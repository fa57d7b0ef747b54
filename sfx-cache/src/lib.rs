//! TTL data cache for raw cluster fetch results.
//!
//! Remote calls are expensive and the explorer re-asks for the same
//! collections constantly (every expansion, every refresh). This crate keeps
//! the raw results for a bounded time so repeated asks within the TTL cost
//! nothing.
//!
//! # Keys
//!
//! [`CacheKey`] builds `kind:cluster:parent...` strings. Prefix invalidation
//! scopes eviction to one cluster or one parent subtree without enumerating
//! keys.
//!
//! # Example
//!
//! ```ignore
//! let key = CacheKey::new(EntityKind::Service, "cluster1").with_parent(app_id);
//! let read = cache
//!     .get_or_fetch(&key.to_string(), || source.list_services(app_id))
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::trace!(staleness = ?read.staleness(), "served services from cache");
//! }
//! ```

pub mod key;
pub mod read;
pub mod stats;
pub mod store;

pub use key::CacheKey;
pub use read::CacheRead;
pub use stats::CacheStats;
pub use store::DataCache;
