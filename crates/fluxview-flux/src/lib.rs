//! flux CLI integration
//!
//! This crate runs `flux tree` against a cluster and parses the JSON dependency
//! trees it prints.

pub mod command;
pub mod protocol;

pub use command::{FluxCli, FluxError};
pub use protocol::{DependencyTree, GroupKind, ObjectRef, WorkloadKind};
