//! Dependency tree flattening
//!
//! Turns the nested output of `flux tree` into nodes, re-grouping by namespace
//! at every nesting level.

use fluxview_flux::DependencyTree;

use crate::resource::{KindRegistry, Resource, ResourceKey};

use super::grouping::{attach, group_by_namespace, Grouped};
use super::models::{Node, NodeId, Tree, TreeError};

/// Builds node hierarchies from dependency trees
pub struct DependencyFlattener<'a> {
    registry: &'a KindRegistry,
    namespaces: &'a [String],
    max_depth: usize,
}

impl<'a> DependencyFlattener<'a> {
    pub fn new(registry: &'a KindRegistry, namespaces: &'a [String], max_depth: usize) -> Self {
        Self {
            registry,
            namespaces,
            max_depth: max_depth.max(1),
        }
    }

    /// Build nodes for unparented entries. Entries with an empty namespace
    /// take `parent_namespace`.
    pub fn build(&self, tree: &mut Tree, entries: &[DependencyTree], parent_namespace: Option<&str>) -> Grouped {
        let mut path = Vec::new();
        let flat = self.build_level(tree, entries, parent_namespace.unwrap_or(""), 1, &mut path);
        group_by_namespace(tree, &flat, self.namespaces)
    }

    /// Replace the children of `parent` with the grouped entries and mark
    /// them loaded. Returns the number of nodes created.
    pub fn attach_to(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        entries: &[DependencyTree],
        parent_namespace: &str,
    ) -> Result<usize, TreeError> {
        if tree.get(parent).is_none() {
            return Err(TreeError::NodeNotFound(parent));
        }
        let before = tree.len();
        tree.clear_children(parent);
        let cleared = tree.len();

        let grouped = self.build(tree, entries, Some(parent_namespace));
        attach(tree, Some(parent), grouped)?;

        if let Some(node) = tree.get_mut(parent) {
            node.children_loaded = true;
        }
        tracing::debug!(
            "Attached dependency tree ({} nodes, replaced {})",
            tree.len() - cleared,
            before - cleared
        );
        Ok(tree.len() - cleared)
    }

    /// One nesting level: a node per entry, each with its own children
    /// already grouped. `path` holds the keys of the enclosing entries.
    fn build_level(
        &self,
        tree: &mut Tree,
        entries: &[DependencyTree],
        parent_namespace: &str,
        depth: usize,
        path: &mut Vec<ResourceKey>,
    ) -> Vec<NodeId> {
        if depth > self.max_depth {
            tracing::warn!(
                "Dependency tree deeper than {} levels, dropping {} entries",
                self.max_depth,
                entries.len()
            );
            return Vec::new();
        }

        let mut level = Vec::with_capacity(entries.len());
        for entry in entries {
            let object = &entry.resource;
            let namespace = if object.namespace.is_empty() {
                parent_namespace
            } else {
                object.namespace.as_str()
            };

            let resource = Resource::new(object.kind(), &object.name, Some(namespace));
            let key = resource.key();
            if path.contains(&key) {
                tracing::warn!("Skipping {} already present higher in its dependency tree", key);
                continue;
            }

            let mut node = Node::resource(self.registry.label(&resource), resource);
            node.children_loaded = true;
            let id = tree.insert(node);

            if !entry.resources.is_empty() {
                path.push(key);
                let children = self.build_level(tree, &entry.resources, namespace, depth + 1, path);
                path.pop();

                let grouped = group_by_namespace(tree, &children, self.namespaces);
                if let Err(e) = attach(tree, Some(id), grouped) {
                    tracing::warn!("Failed to attach dependencies of {}: {}", entry.resource.name, e);
                }
            }
            level.push(id);
        }
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::models::{ExpandState, NodePayload};
    use fluxview_flux::{GroupKind, ObjectRef};

    fn entry(kind: &str, name: &str, namespace: &str, resources: Vec<DependencyTree>) -> DependencyTree {
        DependencyTree {
            resource: ObjectRef {
                name: name.into(),
                namespace: namespace.into(),
                group_kind: GroupKind {
                    group: String::new(),
                    kind: kind.into(),
                },
            },
            resources,
        }
    }

    fn namespace_of(tree: &Tree, id: NodeId) -> Option<String> {
        tree.get(id)
            .and_then(|n| n.resource_ref())
            .and_then(|r| r.namespace().map(String::from))
    }

    #[test]
    fn test_nested_entry_inherits_namespace() {
        let registry = KindRegistry::flux();
        let namespaces = vec!["apps".to_string()];
        let flattener = DependencyFlattener::new(&registry, &namespaces, 8);
        let mut tree = Tree::new();

        let entries = vec![entry(
            "HelmRelease",
            "podinfo",
            "apps",
            vec![entry("Deployment", "podinfo", "", vec![])],
        )];
        let grouped = flattener.build(&mut tree, &entries, None);

        assert_eq!(grouped.groups.len(), 1);
        let group = grouped.groups[0];
        let release = tree.children(group)[0];
        assert_eq!(tree.get(release).unwrap().label, "podinfo");

        // level-2 grouping wraps the inherited namespace in its own group
        let inner_group = tree.children(release)[0];
        assert_eq!(tree.get(inner_group).unwrap().namespace_name(), Some("apps"));
        let deployment = tree.children(inner_group)[0];
        assert_eq!(tree.get(deployment).unwrap().label, "Deployment: podinfo");
        assert_eq!(namespace_of(&tree, deployment).as_deref(), Some("apps"));
        assert_eq!(tree.get(release).unwrap().expand_state, ExpandState::Collapsed);
    }

    #[test]
    fn test_top_level_uses_caller_namespace() {
        let registry = KindRegistry::flux();
        let flattener = DependencyFlattener::new(&registry, &[], 8);
        let mut tree = Tree::new();

        let grouped = flattener.build(&mut tree, &[entry("ConfigMap", "settings", "", vec![])], Some("team-a"));
        assert_eq!(grouped.groups.len(), 1);
        assert_eq!(tree.get(grouped.groups[0]).unwrap().namespace_name(), Some("team-a"));

        let unparented = flattener.build(&mut tree, &[entry("ClusterRole", "view", "", vec![])], None);
        assert!(unparented.groups.is_empty());
        assert_eq!(unparented.cluster_scoped.len(), 1);
    }

    #[test]
    fn test_cycle_is_skipped() {
        let registry = KindRegistry::flux();
        let flattener = DependencyFlattener::new(&registry, &[], 8);
        let mut tree = Tree::new();

        // a -> b -> a repeats a key on the path
        let cyclic = entry(
            "Kustomization",
            "a",
            "ns",
            vec![entry("Kustomization", "b", "ns", vec![entry("Kustomization", "a", "ns", vec![])])],
        );
        let grouped = flattener.build(&mut tree, &[cyclic], None);
        attach(&mut tree, None, grouped).unwrap();

        let names: Vec<_> = tree
            .walk()
            .iter()
            .filter_map(|(depth, n)| n.resource_ref().map(|r| (*depth, r.name().to_string())))
            .collect();
        assert_eq!(names, vec![(1, "a".to_string()), (3, "b".to_string())]);
    }

    #[test]
    fn test_depth_limit_truncates() {
        let registry = KindRegistry::flux();
        let flattener = DependencyFlattener::new(&registry, &[], 3);
        let mut tree = Tree::new();

        let mut deep = entry("ConfigMap", "level-5", "ns", vec![]);
        for level in (1..5).rev() {
            deep = entry("ConfigMap", &format!("level-{level}"), "ns", vec![deep]);
        }
        let grouped = flattener.build(&mut tree, &[deep], None);
        attach(&mut tree, None, grouped).unwrap();

        let names: Vec<_> = tree
            .walk()
            .iter()
            .filter_map(|(_, n)| n.resource_ref().map(|r| r.name().to_string()))
            .collect();
        assert_eq!(names, ["level-1", "level-2", "level-3"]);
    }

    #[test]
    fn test_attach_replaces_children() {
        let registry = KindRegistry::flux();
        let namespaces = vec!["flux-system".to_string()];
        let flattener = DependencyFlattener::new(&registry, &namespaces, 8);
        let mut tree = Tree::new();

        let ks = tree.insert(Node::resource(
            "apps",
            Resource::new("Kustomization", "apps", Some("flux-system")),
        ));
        tree.push_root(ks).unwrap();

        let entries = vec![
            entry("Namespace", "podinfo", "", vec![]),
            entry("GitRepository", "podinfo", "flux-system", vec![]),
        ];
        let created = flattener.attach_to(&mut tree, ks, &entries, "flux-system").unwrap();
        // the Namespace inherits flux-system but still stays outside any group
        assert_eq!(created, 3);
        let children = tree.child_nodes(ks);
        assert!(children[0].is_namespace());
        assert!(matches!(children[1].payload, NodePayload::Resource(_)));
        assert!(tree.get(ks).unwrap().children_loaded);

        let again = flattener.attach_to(&mut tree, ks, &entries, "flux-system").unwrap();
        assert_eq!(again, 3);
        assert_eq!(tree.len(), 4);
    }
}
