use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::resource::{ClusterContext, Resource, ResourceKey};

use super::status::ReconcileStatus;

pub type NodeId = Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Cannot attach node {0} beneath itself")]
    CyclicAttach(NodeId),
}

/// Expand/collapse state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandState {
    Collapsed,
    Expanded,
    /// No children and nothing to load
    Leaf,
}

/// Placeholder nodes shown instead of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    Loading,
    NoResources,
    FailedToLoad,
}

impl Sentinel {
    pub fn label(self) -> &'static str {
        match self {
            Sentinel::Loading => "Loading...",
            Sentinel::NoResources => "No Resources",
            Sentinel::FailedToLoad => "Failed to load",
        }
    }
}

/// What a node stands for
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Synthetic parent for one namespace
    Namespace(String),
    /// A fetched cluster object
    Resource(Resource),
    /// A kubeconfig context
    Cluster(ClusterContext),
    Sentinel(Sentinel),
}

/// One element of a provider tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub description: Option<String>,
    /// Owning parent; None for roots and detached nodes
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub expand_state: ExpandState,
    pub status: Option<ReconcileStatus>,
    pub payload: NodePayload,
    /// Set once lazily loaded children (dependency trees) are attached
    pub children_loaded: bool,
}

impl Node {
    fn with_payload(label: String, payload: NodePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            description: None,
            parent: None,
            children: Vec::new(),
            expand_state: ExpandState::Leaf,
            status: None,
            payload,
            children_loaded: false,
        }
    }

    /// Namespace group; starts collapsed so a rollup is shown
    pub fn namespace(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut node = Self::with_payload(name.clone(), NodePayload::Namespace(name));
        node.expand_state = ExpandState::Collapsed;
        node
    }

    /// Resource node; label and status are filled in by the caller
    pub fn resource(label: impl Into<String>, resource: Resource) -> Self {
        Self::with_payload(label.into(), NodePayload::Resource(resource))
    }

    pub fn cluster(context: ClusterContext) -> Self {
        let mut node = Self::with_payload(context.name.clone(), NodePayload::Cluster(context.clone()));
        node.description = context.server.clone();
        if context.current {
            node.description = Some(match context.server {
                Some(server) => format!("current · {}", server),
                None => "current".to_string(),
            });
        }
        node
    }

    pub fn sentinel(sentinel: Sentinel) -> Self {
        Self::with_payload(sentinel.label().to_string(), NodePayload::Sentinel(sentinel))
    }

    pub fn resource_ref(&self) -> Option<&Resource> {
        match &self.payload {
            NodePayload::Resource(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn namespace_name(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Namespace(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.payload, NodePayload::Namespace(_))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.payload, NodePayload::Sentinel(_))
    }

    /// Identity key for resource and cluster nodes
    pub fn key(&self) -> Option<ResourceKey> {
        match &self.payload {
            NodePayload::Resource(resource) => Some(resource.key()),
            NodePayload::Cluster(context) => Some(ResourceKey::new("Context", "", &context.name)),
            _ => None,
        }
    }
}

/// Arena of nodes plus the ordered list of roots
///
/// Nodes refer to each other by id; a node has at most one parent, and the
/// parent's `children` list is the only owner of that relationship.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree holding only one placeholder
    pub fn with_sentinel(sentinel: Sentinel) -> Self {
        let mut tree = Self::new();
        let id = tree.insert(Node::sentinel(sentinel));
        tree.roots.push(id);
        tree
    }

    /// Add a detached node to the arena
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn root_nodes(&self) -> Vec<&Node> {
        self.roots.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_nodes(&self, id: NodeId) -> Vec<&Node> {
        self.children(id)
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect()
    }

    /// The single placeholder, if that is all the tree shows
    pub fn sentinel(&self) -> Option<Sentinel> {
        match self.root_nodes().as_slice() {
            [node] => match node.payload {
                NodePayload::Sentinel(sentinel) => Some(sentinel),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether `ancestor` is `id` or one of its parents
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.nodes.get(&node_id).and_then(|n| n.parent);
        }
        false
    }

    /// Unlink a node from its parent or from the root list
    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        match parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    /// Append `child` to `parent`, moving it away from any previous parent.
    /// A leaf parent becomes collapsed.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::NodeNotFound(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(TreeError::NodeNotFound(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(TreeError::CyclicAttach(child));
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
            if node.expand_state == ExpandState::Leaf {
                node.expand_state = ExpandState::Collapsed;
            }
        }
        Ok(())
    }

    /// Detach `child` from `parent`; the child stays in the arena
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let is_child = self
            .nodes
            .get(&parent)
            .ok_or(TreeError::NodeNotFound(parent))?
            .children
            .contains(&child);
        if !is_child {
            return Err(TreeError::NodeNotFound(child));
        }
        self.detach(child);
        Ok(())
    }

    /// Make a node a root at `index` (clamped), detaching it first
    pub fn insert_root(&mut self, index: usize, id: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::NodeNotFound(id));
        }
        self.detach(id);
        let index = index.min(self.roots.len());
        self.roots.insert(index, id);
        Ok(())
    }

    pub fn push_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        let len = self.roots.len();
        self.insert_root(len, id)
    }

    /// Drop a node and everything beneath it from the arena
    pub fn remove_subtree(&mut self, id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.detach(id);
        let mut stack = vec![id];
        let mut removed = None;
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&node_id) {
                stack.extend(node.children.iter().copied());
                if node_id == id {
                    removed = Some(node);
                }
            }
        }
        removed
    }

    /// Drop every child of a node
    pub fn clear_children(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        for child in children {
            self.remove_subtree(child);
        }
    }

    /// Sort a node's children by label (byte-wise, case-sensitive)
    pub fn sort_children(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let mut children = node.children.clone();
        self.sort_ids_by_label(&mut children);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }
    }

    /// Label sort of an id list; equal labels fall back to the identity key,
    /// so the result never depends on input order
    pub fn sort_ids_by_label(&self, ids: &mut [NodeId]) {
        ids.sort_by(|a, b| {
            let na = self.nodes.get(a);
            let nb = self.nodes.get(b);
            let la = na.map(|n| n.label.as_str()).unwrap_or("");
            let lb = nb.map(|n| n.label.as_str()).unwrap_or("");
            la.cmp(lb)
                .then_with(|| na.and_then(Node::key).cmp(&nb.and_then(Node::key)))
        });
    }

    /// Child of `parent` (or root, when None) carrying `key`
    pub fn find_child_by_resource(&self, parent: Option<NodeId>, key: &ResourceKey) -> Option<NodeId> {
        let candidates = match parent {
            Some(id) => self.children(id),
            None => self.roots.as_slice(),
        };
        candidates
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).and_then(Node::key).as_ref() == Some(key))
    }

    /// Root namespace group for `namespace`
    pub fn find_namespace_root(&self, namespace: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).and_then(Node::namespace_name) == Some(namespace))
    }

    /// Depth-first walk, parents before children
    pub fn walk(&self) -> Vec<(usize, &Node)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, NodeId)> = self.roots.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push((depth, node));
                stack.extend(node.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        out
    }
}
