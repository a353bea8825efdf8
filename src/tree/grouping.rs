//! Namespace grouping
//!
//! Partitions a flat list of resource nodes into one group node per namespace
//! plus a residual list of cluster-scoped nodes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::models::{Node, NodeId, NodePayload, Tree, TreeError};
use super::status::refresh_group;

/// Result of grouping one level of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouped {
    /// Namespace groups, in namespace-list order
    pub groups: Vec<NodeId>,
    /// Nodes without a namespace and Namespace objects, sorted by label
    pub cluster_scoped: Vec<NodeId>,
}

impl Grouped {
    pub fn len(&self) -> usize {
        self.groups.len() + self.cluster_scoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Groups first, then the residual
    pub fn into_ordered(self) -> Vec<NodeId> {
        let mut ids = self.groups;
        ids.extend(self.cluster_scoped);
        ids
    }
}

/// Namespace a node groups under, or None when it stays cluster-scoped
fn grouping_namespace(node: &Node) -> Option<&str> {
    match &node.payload {
        NodePayload::Resource(resource) if resource.kind != "Namespace" => resource.namespace(),
        _ => None,
    }
}

/// Position of a namespace in display order: known namespaces by list
/// position, unknown ones after them in lexical order
pub fn compare_namespaces(namespaces: &[String], a: &str, b: &str) -> Ordering {
    let rank = |ns: &str| namespaces.iter().position(|known| known == ns).unwrap_or(usize::MAX);
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

/// Build namespace groups for `candidates`.
///
/// Every candidate ends up either as a child of exactly one new group or in
/// the cluster-scoped residual. Groups are not attached anywhere; see
/// [`attach`].
pub fn group_by_namespace(tree: &mut Tree, candidates: &[NodeId], namespaces: &[String]) -> Grouped {
    let mut by_namespace: HashMap<String, Vec<NodeId>> = HashMap::new();
    let mut cluster_scoped = Vec::new();

    for id in candidates {
        let Some(node) = tree.get(*id) else {
            continue;
        };
        match grouping_namespace(node) {
            Some(ns) => by_namespace.entry(ns.to_string()).or_default().push(*id),
            None => cluster_scoped.push(*id),
        }
    }

    let mut ordered: Vec<(String, Vec<NodeId>)> = Vec::with_capacity(by_namespace.len());
    for ns in namespaces {
        if let Some(members) = by_namespace.remove(ns) {
            ordered.push((ns.clone(), members));
        }
    }
    if !by_namespace.is_empty() {
        let unknown: BTreeMap<String, Vec<NodeId>> = by_namespace.into_iter().collect();
        tracing::debug!(
            "Grouping {} namespaces missing from the namespace list: {:?}",
            unknown.len(),
            unknown.keys().collect::<Vec<_>>()
        );
        ordered.extend(unknown);
    }

    let mut groups = Vec::with_capacity(ordered.len());
    for (ns, members) in ordered {
        let group = tree.insert(Node::namespace(ns.as_str()));
        for member in members {
            if let Err(e) = tree.add_child(group, member) {
                tracing::warn!("Failed to group node under {}: {}", ns, e);
            }
        }
        tree.sort_children(group);
        refresh_group(tree, group);
        groups.push(group);
    }

    tree.sort_ids_by_label(&mut cluster_scoped);

    Grouped {
        groups,
        cluster_scoped,
    }
}

/// Attach grouped nodes under `parent`, or as roots when `parent` is None
pub fn attach(tree: &mut Tree, parent: Option<NodeId>, grouped: Grouped) -> Result<(), TreeError> {
    for id in grouped.into_ordered() {
        match parent {
            Some(parent) => tree.add_child(parent, id)?,
            None => tree.push_root(id)?,
        }
    }
    Ok(())
}

/// Reverse of grouping: resource nodes pulled out of `ids`' groups plus the
/// non-group ids themselves; group nodes are removed from the arena
pub fn ungroup(tree: &mut Tree, ids: &[NodeId]) -> Vec<NodeId> {
    let mut flat = Vec::new();
    for id in ids {
        let is_group = tree.get(*id).is_some_and(Node::is_namespace);
        if is_group {
            let members = tree.children(*id).to_vec();
            for member in &members {
                if let Err(e) = tree.remove_child(*id, *member) {
                    tracing::warn!("Failed to detach node from group: {}", e);
                }
            }
            flat.extend(members);
            tree.remove_subtree(*id);
        } else {
            flat.push(*id);
        }
    }
    flat
}
