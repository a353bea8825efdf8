//! `flux tree` JSON output
//!
//! Types for the nested dependency trees printed by
//! `flux tree kustomization|helmrelease NAME -n NAMESPACE -o json`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Tree Output
// ============================================================================

/// API group and kind of a managed object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}

/// Reference to one object in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRef {
    pub name: String,
    /// Empty for cluster-scoped objects and for nested entries that omit it
    #[serde(default)]
    pub namespace: String,
    pub group_kind: GroupKind,
}

impl ObjectRef {
    pub fn kind(&self) -> &str {
        &self.group_kind.kind
    }
}

/// One node of a "what created what" tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub resource: ObjectRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<DependencyTree>,
}

impl DependencyTree {
    /// Total number of entries in this tree, including the root
    pub fn len(&self) -> usize {
        1 + self.resources.iter().map(DependencyTree::len).sum::<usize>()
    }

    /// Depth of the deepest branch (a lone root has depth 1)
    pub fn depth(&self) -> usize {
        1 + self
            .resources
            .iter()
            .map(DependencyTree::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Parse the stdout of `flux tree ... -o json`
pub fn parse_tree(output: &str) -> Result<DependencyTree, serde_json::Error> {
    serde_json::from_str(output.trim())
}

// ============================================================================
// Workload Kinds
// ============================================================================

/// Workload kinds `flux tree` can inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Kustomization,
    HelmRelease,
}

impl WorkloadKind {
    /// Subcommand name for `flux tree`
    pub fn subcommand(self) -> &'static str {
        match self {
            WorkloadKind::Kustomization => "kustomization",
            WorkloadKind::HelmRelease => "helmrelease",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Kustomization" => Some(WorkloadKind::Kustomization),
            "HelmRelease" => Some(WorkloadKind::HelmRelease),
            _ => None,
        }
    }
}
