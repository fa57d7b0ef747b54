//! Composite cache keys.
//!
//! Keys follow `kind:cluster:parent...`, for example
//! `services:cluster1:App` or `replicas:cluster1:App:Svc:<partition>`.
//! The kind comes first so one collection can be evicted for a cluster with
//! a single prefix, and parent segments narrow it to one subtree.

use sfx_core::EntityKind;
use std::fmt;

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// A cache key scoped to an entity kind and a cluster.
///
/// A key cannot be built without a cluster identity, so results from two
/// clusters sharing one cache never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: EntityKind,
    cluster: String,
    parents: Vec<String>,
}

impl CacheKey {
    /// Key for `kind` scoped to `cluster`, with no parents yet.
    pub fn new(kind: EntityKind, cluster: impl Into<String>) -> Self {
        Self {
            kind,
            cluster: cluster.into(),
            parents: Vec::new(),
        }
    }

    /// Append one parent identity segment.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Same cluster and parent chain, different collection.
    pub fn with_kind(&self, kind: EntityKind) -> Self {
        Self {
            kind,
            cluster: self.cluster.clone(),
            parents: self.parents.clone(),
        }
    }

    /// Entity kind the key holds.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Cluster identity segment.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Parent identifiers, outermost first.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// String prefix covering this key and every key nested below it.
    ///
    /// The trailing separator keeps `apps:cluster1` from also matching
    /// `apps:cluster10`.
    pub fn scope(&self) -> String {
        let mut scope = self.to_string();
        scope.push(SEPARATOR);
        scope
    }

    /// Prefix covering every key of `kind` for `cluster`.
    pub fn prefix(kind: EntityKind, cluster: &str) -> String {
        format!("{}{SEPARATOR}{}{SEPARATOR}", kind.as_str(), cluster)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.kind.as_str(), self.cluster)?;
        for parent in &self.parents {
            write!(f, "{SEPARATOR}{parent}")?;
        }
        Ok(())
    }
}

impl From<&CacheKey> for String {
    fn from(key: &CacheKey) -> Self {
        key.to_string()
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}
