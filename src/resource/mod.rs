//! Cluster object model
//!
//! Fetched objects, their identity keys, and the kind → behavior table.

pub mod kinds;
pub mod models;

pub use kinds::{Category, KindRegistry, KindSpec, RegistryError, StatusRule};
pub use models::{ClusterContext, Condition, Resource, ResourceKey, ResourceMeta, ResourceStatus};
