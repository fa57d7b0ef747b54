//! Plain-text rendering of the explorer tree.

use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sfx_tree::{Collapsible, TreeNode, ViewModel};

const INDENT: &str = "  ";

/// Walks the tree from a node, expanding every collapsible node up to
/// `max_depth` levels below it.
///
/// Expansion goes through [`TreeNode::children`], so unloaded nodes fetch
/// on the way down exactly as an interactive renderer would trigger them.
#[derive(Debug, Clone, Copy)]
pub struct TreeRenderer {
    max_depth: usize,
}

impl TreeRenderer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub async fn render(&self, node: &Arc<TreeNode>) -> String {
        let mut out = String::new();
        self.render_into(node, 0, &mut out).await;
        out
    }

    fn render_into<'a>(
        &'a self,
        node: &'a Arc<TreeNode>,
        depth: usize,
        out: &'a mut String,
    ) -> BoxFuture<'a, ()> {
        async move {
            let children = if depth < self.max_depth && !node.is_leaf() {
                node.children().await
            } else {
                None
            };
            // The view reads the state the expansion above just produced.
            let view = node.view();
            out.push_str(&format_line(&view, depth, children.is_some()));
            out.push('\n');

            for child in children.iter().flatten() {
                self.render_into(child, depth + 1, out).await;
            }
        }
        .boxed()
    }
}

/// One line of output: indentation, expander marker, label, health and
/// description.
pub fn format_line(view: &ViewModel, depth: usize, expanded: bool) -> String {
    let marker = match (view.collapsible, expanded) {
        (Collapsible::None, _) => ' ',
        (Collapsible::Collapsed, true) => '-',
        (Collapsible::Collapsed, false) => '+',
    };
    let mut line = format!("{}{} {}", INDENT.repeat(depth), marker, view.label);
    if let Some(health) = view.health {
        let _ = write!(line, " [{health}]");
    }
    if let Some(description) = view.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(line, " - {description}");
    }
    if view.retryable {
        line.push_str(" (retry available)");
    }
    line
}
