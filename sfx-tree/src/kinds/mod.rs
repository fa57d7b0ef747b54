//! Node kinds of the cluster explorer.
//!
//! Each kind is a configuration of the generic [`TreeNode`](crate::TreeNode):
//!
//! | kind                | policy      | protected | children             |
//! |---------------------|-------------|-----------|----------------------|
//! | cluster (root)      | preserving  | yes       | nodes, applications  |
//! | nodes group         | destructive | yes       | cluster node leaves  |
//! | applications group  | destructive | yes       | applications         |
//! | application         | destructive | no        | services             |
//! | service             | destructive | no        | partitions           |
//! | partition           | destructive | no        | replica leaves       |
//!
//! Fetches read through the session's data cache. Child ids extend the
//! parent id with one `/`-separated segment.

mod applications;
mod cluster;
mod groups;
mod nodes;

pub use applications::{application, partition, replica, service};
pub use cluster::cluster_root;
pub(crate) use cluster::reseed_groups;
pub use groups::{applications_group, nodes_group};
pub use nodes::cluster_node;

fn child_id(parent_id: &str, segment: &str) -> String {
    format!("{parent_id}/{segment}")
}
