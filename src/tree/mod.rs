//! Resource tree engine
//!
//! Node arena, status rollups, namespace grouping, dependency flattening and
//! expand-state preservation.

pub mod dependency;
pub mod grouping;
pub mod models;
pub mod state;
pub mod status;

pub use dependency::DependencyFlattener;
pub use grouping::{group_by_namespace, Grouped};
pub use models::{ExpandState, Node, NodeId, NodePayload, Sentinel, Tree, TreeError};
pub use state::CollapsibleStateStore;
pub use status::{ReconcileStatus, Rollup};
