//! Renderer-facing projection of a node.

use std::fmt;
use std::sync::Arc;

use sfx_core::{worst, HealthState};

use crate::node::{LoadState, Summary, TreeNode};

/// What a node represents in the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Cluster,
    NodesGroup,
    ApplicationsGroup,
    ClusterNode,
    Application,
    Service,
    Partition,
    Replica,
    Error,
}

impl NodeKind {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Cluster => "cluster",
            NodeKind::NodesGroup => "nodes-group",
            NodeKind::ApplicationsGroup => "applications-group",
            NodeKind::ClusterNode => "node",
            NodeKind::Application => "application",
            NodeKind::Service => "service",
            NodeKind::Partition => "partition",
            NodeKind::Replica => "replica",
            NodeKind::Error => "error",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the renderer should offer an expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collapsible {
    None,
    Collapsed,
}

/// Display data for one node. Built synchronously from local state only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub description: Option<String>,
    pub health: Option<HealthState>,
    pub collapsible: Collapsible,
    pub retryable: bool,
}

impl ViewModel {
    /// Plain, non-collapsible view without health.
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            description: None,
            health: None,
            collapsible: Collapsible::None,
            retryable: false,
        }
    }

    /// Secondary text shown after the label.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Health icon, `None` for no icon.
    pub fn with_health(mut self, health: Option<HealthState>) -> Self {
        self.health = health;
        self
    }

    /// Offer an expander.
    pub fn collapsed(mut self) -> Self {
        self.collapsible = Collapsible::Collapsed;
        self
    }

    /// Mark as an error placeholder the user can retry.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// Read-only view of a node's state handed to view functions.
///
/// Borrowed from the node while its state lock is held, so view functions
/// must not call back into the same node.
pub struct NodeSnapshot<'a> {
    pub id: &'a str,
    pub kind: NodeKind,
    pub load: LoadState,
    pub summary: Summary,
    pub children: Option<&'a [Arc<TreeNode>]>,
    pub error: Option<&'a str>,
}

impl NodeSnapshot<'_> {
    /// Worst summary health among loaded children, falling back to the
    /// node's own cached health when no children are held.
    pub fn aggregate_health(&self) -> Option<HealthState> {
        match self.children {
            Some(children) if self.load == LoadState::Loaded && !children.is_empty() => {
                worst(children.iter().map(|child| child.summary().health))
                    .or(self.summary.health)
            }
            _ => self.summary.health,
        }
    }

    /// `"<title> (<count>)"`, or `"<title> (...)"` when no count has ever
    /// been observed.
    pub fn counted_label(&self, title: &str) -> String {
        match self.summary.count {
            Some(count) => format!("{title} ({count})"),
            None => format!("{title} (...)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(summary: Summary) -> NodeSnapshot<'static> {
        NodeSnapshot {
            id: "c/applications",
            kind: NodeKind::ApplicationsGroup,
            load: LoadState::Unloaded,
            summary,
            children: None,
            error: None,
        }
    }

    #[test]
    fn test_counted_label() {
        let unknown = snapshot(Summary::default());
        assert_eq!(unknown.counted_label("Applications"), "Applications (...)");

        let known = snapshot(Summary {
            count: Some(3),
            health: None,
        });
        assert_eq!(known.counted_label("Applications"), "Applications (3)");
    }

    #[test]
    fn test_aggregate_health_falls_back_to_summary() {
        let snap = snapshot(Summary {
            count: None,
            health: Some(HealthState::Warning),
        });
        assert_eq!(snap.aggregate_health(), Some(HealthState::Warning));
    }

    #[test]
    fn test_view_model_builder() {
        let view = ViewModel::new("c/x/error", NodeKind::Error, "Error: boom").retryable();
        assert!(view.retryable);
        assert_eq!(view.collapsible, Collapsible::None);
        assert_eq!(view.kind.to_string(), "error");
    }
}
