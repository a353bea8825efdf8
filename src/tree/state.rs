use std::collections::HashMap;

use super::models::{ExpandState, Tree};
use super::status::refresh_group;

/// Expand/collapse choices of root namespace groups, carried across a reload
#[derive(Debug, Clone, Default)]
pub struct CollapsibleStateStore {
    states: HashMap<String, ExpandState>,
}

impl CollapsibleStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of every root namespace group, replacing what was
    /// stored before
    pub fn capture(&mut self, tree: &Tree) {
        self.states.clear();
        for node in tree.root_nodes() {
            if let Some(namespace) = node.namespace_name() {
                self.states.insert(namespace.to_string(), node.expand_state);
            }
        }
        tracing::debug!("Captured expand state for {} namespace groups", self.states.len());
    }

    /// Reapply stored states to matching root groups of a rebuilt tree.
    /// Returns how many nodes were restored.
    pub fn apply(&self, tree: &mut Tree) -> usize {
        let roots = tree.roots().to_vec();
        let mut restored = 0;
        for id in roots {
            let Some(node) = tree.get_mut(id) else {
                continue;
            };
            let Some(state) = node.namespace_name().and_then(|ns| self.states.get(ns)) else {
                continue;
            };
            node.expand_state = *state;
            restored += 1;
            refresh_group(tree, id);
        }
        restored
    }

    pub fn get(&self, namespace: &str) -> Option<ExpandState> {
        self.states.get(namespace).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::tree::grouping::{attach, group_by_namespace};
    use crate::tree::models::Node;

    fn build(names: &[(&str, &str)]) -> Tree {
        let mut tree = Tree::new();
        let ids: Vec<_> = names
            .iter()
            .map(|(name, ns)| tree.insert(Node::resource(*name, Resource::new("GitRepository", *name, Some(*ns)))))
            .collect();
        let namespaces = vec!["default".to_string(), "flux-system".to_string()];
        let grouped = group_by_namespace(&mut tree, &ids, &namespaces);
        attach(&mut tree, None, grouped).unwrap();
        tree
    }

    #[test]
    fn test_round_trip_across_rebuild() {
        let mut tree = build(&[("a", "default"), ("b", "flux-system")]);
        let first = tree.roots()[0];
        tree.get_mut(first).unwrap().expand_state = ExpandState::Expanded;

        let mut store = CollapsibleStateStore::new();
        store.capture(&tree);
        assert_eq!(store.get("default"), Some(ExpandState::Expanded));
        assert_eq!(store.get("flux-system"), Some(ExpandState::Collapsed));

        let mut rebuilt = build(&[("b", "flux-system"), ("a", "default"), ("c", "default")]);
        assert_eq!(store.apply(&mut rebuilt), 2);

        let states: Vec<_> = rebuilt
            .root_nodes()
            .iter()
            .map(|n| (n.namespace_name().unwrap().to_string(), n.expand_state, n.label.clone()))
            .collect();
        assert_eq!(
            states,
            vec![
                ("default".to_string(), ExpandState::Expanded, "default".to_string()),
                ("flux-system".to_string(), ExpandState::Collapsed, "flux-system (1)".to_string()),
            ]
        );
    }

    #[test]
    fn test_capture_ignores_non_group_roots() {
        let mut tree = Tree::new();
        let id = tree.insert(Node::resource("viewer", Resource::new("ClusterRole", "viewer", None)));
        tree.push_root(id).unwrap();

        let mut store = CollapsibleStateStore::new();
        store.capture(&tree);
        assert!(store.is_empty());
    }
}
