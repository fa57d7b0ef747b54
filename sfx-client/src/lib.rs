//! REST data source for the cluster explorer.
//!
//! [`RestDataSource`] implements [`sfx_core::ClusterDataSource`] against a
//! cluster's HTTP management endpoint. Paged lists are followed to the end
//! and PascalCase payloads are normalized into the core records before the
//! tree ever sees them.

pub mod error;
pub mod rest;
mod wire;

pub use error::ClientError;
pub use rest::RestDataSource;
