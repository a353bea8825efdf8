//! Data providers
//!
//! A provider owns the tree of one category. `reload` rebuilds it from the
//! fetcher; `add`, `update` and `delete` patch it in place without fetching.
//!
//! Changes that arrive while a reload is running are queued and replayed, in
//! arrival order, against the freshly built tree.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_channel::Sender;
use futures::future::join_all;
use parking_lot::Mutex;

use crate::resource::{Category, KindRegistry, KindSpec, RegistryError, Resource, ResourceKey};
use crate::tree::grouping::{attach, compare_namespaces, group_by_namespace};
use crate::tree::status::{refresh_group, update_status};
use crate::tree::{
    CollapsibleStateStore, DependencyFlattener, ExpandState, Node, NodeId, NodePayload, Sentinel, Tree,
    TreeError,
};

use super::fetch::{FetchError, Fetcher};
use super::loading::{ReloadScheduler, ReloadTicket};
use super::namespace::NamespaceCache;

/// What changed in a provider's tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    /// The tree now shows only the loading placeholder
    Loading,
    /// The whole tree was replaced
    Reloaded,
    /// A node (and possibly its children) changed
    NodeChanged(NodeId),
    /// A root-level node was removed
    NodeRemoved(NodeId),
}

/// Redraw notification sent to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEvent {
    pub category: Category,
    pub change: TreeChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Objects were fetched; some kinds may have failed
    Loaded { objects: usize, failed_kinds: usize },
    /// Fetches succeeded but returned nothing
    Empty,
    /// Every fetch failed
    Failed,
    /// Another reload was already running
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    /// Not ours, or a stale target
    Ignored,
    /// Queued until the running reload finishes
    Deferred,
}

#[derive(Debug, Clone)]
enum PendingChange {
    Add(Resource),
    Update(Resource),
    Delete(Resource),
}

impl PendingChange {
    fn resource(&self) -> &Resource {
        match self {
            PendingChange::Add(r) | PendingChange::Update(r) | PendingChange::Delete(r) => r,
        }
    }
}

/// Collaborators shared by every provider
#[derive(Clone)]
pub struct ProviderContext {
    pub registry: Arc<KindRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub namespaces: Arc<NamespaceCache>,
    pub events: Option<Sender<TreeEvent>>,
    pub max_dependency_depth: usize,
    pub show_cluster_scoped: bool,
}

impl ProviderContext {
    pub fn new(registry: Arc<KindRegistry>, fetcher: Arc<dyn Fetcher>, namespaces: Arc<NamespaceCache>) -> Self {
        Self {
            registry,
            fetcher,
            namespaces,
            events: None,
            max_dependency_depth: 16,
            show_cluster_scoped: true,
        }
    }

    pub fn with_events(mut self, events: Sender<TreeEvent>) -> Self {
        self.events = Some(events);
        self
    }
}

#[derive(Default)]
struct ProviderState {
    tree: Tree,
    scheduler: ReloadScheduler,
    store: CollapsibleStateStore,
    pending: Vec<PendingChange>,
}

/// Leaves the provider idle if a reload future is dropped before it
/// installs its tree
struct ReloadGuard<'a> {
    provider: &'a DataProvider,
    ticket: Option<ReloadTicket>,
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        tracing::warn!("{} reload abandoned before completion", self.provider.category.title());
        {
            let mut state = self.provider.state.lock();
            if state.tree.sentinel() == Some(Sentinel::Loading) {
                state.tree = Tree::with_sentinel(Sentinel::FailedToLoad);
            }
            self.provider.settle(&mut state, ticket);
        }
        self.provider.notify(TreeChange::Reloaded);
    }
}

/// Swaps a dependency `Loading…` child for `Failed to load` if an expand
/// future is dropped mid-fetch, so the next expand fetches again
struct ExpandGuard<'a> {
    provider: &'a DataProvider,
    node: Option<NodeId>,
}

impl Drop for ExpandGuard<'_> {
    fn drop(&mut self) {
        let Some(id) = self.node.take() else {
            return;
        };
        tracing::warn!("{} dependency load abandoned for node {}", self.provider.category.title(), id);
        let replaced = {
            let mut state = self.provider.state.lock();
            let tree = &mut state.tree;
            let loading = tree
                .child_nodes(id)
                .iter()
                .any(|c| c.payload == NodePayload::Sentinel(Sentinel::Loading));
            if loading {
                tree.clear_children(id);
                let placeholder = tree.insert(Node::sentinel(Sentinel::FailedToLoad));
                tree.add_child(id, placeholder).is_ok()
            } else {
                false
            }
        };
        if replaced {
            self.provider.notify(TreeChange::NodeChanged(id));
        }
    }
}

/// Tree owner for one category
pub struct DataProvider {
    category: Category,
    kinds: Vec<KindSpec>,
    ctx: ProviderContext,
    state: Mutex<ProviderState>,
}

impl DataProvider {
    /// Provider for `kinds`, which must all be registered under `category`
    pub fn new(category: Category, kinds: &[String], ctx: ProviderContext) -> Result<Self, RegistryError> {
        let kinds = ctx.registry.select(category, kinds)?;
        Ok(Self {
            category,
            kinds,
            ctx,
            state: Mutex::new(ProviderState::default()),
        })
    }

    /// Provider for the kubeconfig contexts
    pub fn clusters(ctx: ProviderContext) -> Self {
        Self {
            category: Category::Clusters,
            kinds: Vec::new(),
            ctx,
            state: Mutex::new(ProviderState::default()),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn kinds(&self) -> &[KindSpec] {
        &self.kinds
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().scheduler.is_loading()
    }

    /// Number of changes waiting for the running reload
    pub fn pending_changes(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Copy of the current tree
    pub fn snapshot(&self) -> Tree {
        self.state.lock().tree.clone()
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.state.lock().tree.get(id).cloned()
    }

    pub fn children(&self, id: NodeId) -> Vec<Node> {
        self.state.lock().tree.child_nodes(id).into_iter().cloned().collect()
    }

    /// Root nodes, running the first reload if none has happened yet
    pub async fn root_nodes(&self) -> Vec<Node> {
        let needs_load = {
            let state = self.state.lock();
            !state.scheduler.has_loaded() && !state.scheduler.is_loading()
        };
        if needs_load {
            self.reload().await;
        }
        self.state.lock().tree.root_nodes().into_iter().cloned().collect()
    }

    // ========================================================================
    // Reload
    // ========================================================================

    /// Refetch everything and rebuild the tree. Namespace groups keep their
    /// expand state. Returns `Skipped` if a reload is already running.
    pub async fn reload(&self) -> ReloadOutcome {
        let Some(mut guard) = self.begin_reload() else {
            return ReloadOutcome::Skipped;
        };

        let start = Instant::now();
        let (mut tree, outcome) = match self.category {
            Category::Clusters => self.build_clusters().await,
            _ => self.build_resources().await,
        };

        let Some(ticket) = guard.ticket.take() else {
            return outcome;
        };
        let (restored, replayed) = {
            let mut state = self.state.lock();
            let restored = state.store.apply(&mut tree);
            state.tree = tree;
            let replayed = self.settle(&mut state, ticket);
            (restored, replayed)
        };

        tracing::info!(
            "{} reloaded in {:?}: {:?} (restored {} groups, replayed {} changes)",
            self.category.title(),
            start.elapsed(),
            outcome,
            restored,
            replayed
        );
        self.notify(TreeChange::Reloaded);
        outcome
    }

    /// Enter `Loading`. An empty or placeholder tree is swapped for the
    /// loading placeholder; a real tree stays visible and its group states
    /// are captured.
    fn begin_reload(&self) -> Option<ReloadGuard<'_>> {
        let (ticket, show_placeholder) = {
            let mut state = self.state.lock();
            let Some(ticket) = state.scheduler.try_begin() else {
                tracing::debug!("{} reload already in flight, dropping request", self.category.title());
                return None;
            };
            let state = &mut *state;
            let placeholder = state.tree.is_empty() || state.tree.sentinel().is_some();
            if placeholder {
                state.tree = Tree::with_sentinel(Sentinel::Loading);
            } else {
                state.store.capture(&state.tree);
            }
            (ticket, placeholder)
        };
        if show_placeholder {
            self.notify(TreeChange::Loading);
        }
        Some(ReloadGuard {
            provider: self,
            ticket: Some(ticket),
        })
    }

    /// Return to idle and replay queued changes against the current tree
    fn settle(&self, state: &mut ProviderState, ticket: ReloadTicket) -> usize {
        state.scheduler.finish(ticket);
        let pending = std::mem::take(&mut state.pending);
        let replayed = pending.len();
        for change in pending {
            self.apply_change(&mut state.tree, change);
        }
        replayed
    }

    async fn fetch_kind(&self, kind: &KindSpec) -> Result<Vec<Resource>, FetchError> {
        let start = Instant::now();
        match self.ctx.fetcher.list(kind).await {
            Ok(mut items) => {
                for item in &mut items {
                    if item.kind.is_empty() {
                        item.kind = kind.kind.clone();
                    }
                }
                tracing::debug!("Fetched {} {} in {:?}", items.len(), kind.plural, start.elapsed());
                Ok(items)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", kind.plural, e);
                Err(e)
            }
        }
    }

    async fn build_resources(&self) -> (Tree, ReloadOutcome) {
        let fetches = join_all(self.kinds.iter().map(|kind| self.fetch_kind(kind)));
        let (namespaces, results) = futures::join!(self.ctx.namespaces.load(self.ctx.fetcher.as_ref()), fetches);

        let attempts = results.len();
        let mut failed_kinds = 0;
        let mut resources = Vec::new();
        for result in results {
            match result {
                Ok(items) => resources.extend(items),
                Err(_) => failed_kinds += 1,
            }
        }
        if attempts > 0 && failed_kinds == attempts {
            return (Tree::with_sentinel(Sentinel::FailedToLoad), ReloadOutcome::Failed);
        }

        // without a namespace list, groups follow the observed namespaces
        let namespaces = namespaces.unwrap_or_default();
        let mut tree = Tree::new();
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(resources.len());
        for resource in resources {
            let key = resource.key();
            if !seen.insert(key.clone()) {
                tracing::warn!("Skipping duplicate {}", key);
                continue;
            }
            ids.push(self.insert_resource(&mut tree, resource));
        }

        let mut grouped = group_by_namespace(&mut tree, &ids, &namespaces);
        if !self.ctx.show_cluster_scoped {
            for id in grouped.cluster_scoped.drain(..) {
                tree.remove_subtree(id);
            }
        }
        if grouped.is_empty() {
            return (Tree::with_sentinel(Sentinel::NoResources), ReloadOutcome::Empty);
        }

        let objects = ids.len();
        if let Err(e) = attach(&mut tree, None, grouped) {
            tracing::warn!("Failed to attach {} roots: {}", self.category.title(), e);
        }
        (tree, ReloadOutcome::Loaded { objects, failed_kinds })
    }

    async fn build_clusters(&self) -> (Tree, ReloadOutcome) {
        let contexts = match self.ctx.fetcher.list_contexts().await {
            Ok(contexts) => contexts,
            Err(e) => {
                tracing::warn!("Failed to list kubeconfig contexts: {}", e);
                return (Tree::with_sentinel(Sentinel::FailedToLoad), ReloadOutcome::Failed);
            }
        };
        if contexts.is_empty() {
            return (Tree::with_sentinel(Sentinel::NoResources), ReloadOutcome::Empty);
        }

        let mut tree = Tree::new();
        let objects = contexts.len();
        let mut ids: Vec<_> = contexts.into_iter().map(|ctx| tree.insert(Node::cluster(ctx))).collect();
        tree.sort_ids_by_label(&mut ids);
        for id in ids {
            if let Err(e) = tree.push_root(id) {
                tracing::warn!("Failed to add cluster context: {}", e);
            }
        }
        (tree, ReloadOutcome::Loaded { objects, failed_kinds: 0 })
    }

    /// Detached resource node with label and status filled in
    fn insert_resource(&self, tree: &mut Tree, resource: Resource) -> NodeId {
        let registry = &self.ctx.registry;
        let rule = registry.status_rule(&resource.kind);
        let mut node = Node::resource(registry.label(&resource), resource);
        if node.resource_ref().is_some_and(|r| registry.is_expandable(&r.kind)) {
            node.expand_state = ExpandState::Collapsed;
        }
        let id = tree.insert(node);
        update_status(tree, id, rule);
        id
    }

    // ========================================================================
    // Incremental changes
    // ========================================================================

    /// Insert an object, creating its namespace group if needed. An object
    /// that is already present is updated instead.
    pub fn add(&self, resource: Resource) -> ChangeOutcome {
        self.submit(PendingChange::Add(resource))
    }

    /// Replace a present object; unknown objects are ignored
    pub fn update(&self, resource: Resource) -> ChangeOutcome {
        self.submit(PendingChange::Update(resource))
    }

    /// Remove an object, and its group when that becomes empty
    pub fn delete(&self, resource: &Resource) -> ChangeOutcome {
        self.submit(PendingChange::Delete(resource.clone()))
    }

    fn accepts(&self, resource: &Resource) -> bool {
        self.kinds.iter().any(|spec| spec.kind == resource.kind)
    }

    fn submit(&self, change: PendingChange) -> ChangeOutcome {
        if !self.accepts(change.resource()) {
            tracing::debug!(
                "{} ignores change to {}",
                self.category.title(),
                change.resource().key()
            );
            return ChangeOutcome::Ignored;
        }

        let notification = {
            let mut state = self.state.lock();
            if state.scheduler.is_loading() {
                tracing::debug!("Deferring change to {} until reload finishes", change.resource().key());
                state.pending.push(change);
                return ChangeOutcome::Deferred;
            }
            self.apply_change(&mut state.tree, change)
        };

        match notification {
            Some(change) => {
                self.notify(change);
                ChangeOutcome::Applied
            }
            None => ChangeOutcome::Ignored,
        }
    }

    fn apply_change(&self, tree: &mut Tree, change: PendingChange) -> Option<TreeChange> {
        match change {
            PendingChange::Add(resource) => self.add_to(tree, resource),
            PendingChange::Update(resource) => {
                let key = resource.key();
                let Some((parent, id)) = locate(tree, &key) else {
                    tracing::debug!("Update of unknown {} ignored", key);
                    return None;
                };
                self.replace_resource(tree, parent, id, resource);
                Some(TreeChange::NodeChanged(id))
            }
            PendingChange::Delete(resource) => self.delete_from(tree, &resource.key()),
        }
    }

    fn add_to(&self, tree: &mut Tree, resource: Resource) -> Option<TreeChange> {
        let key = resource.key();
        if let Some((parent, id)) = locate(tree, &key) {
            tracing::debug!("{} already present, updating", key);
            self.replace_resource(tree, parent, id, resource);
            return Some(TreeChange::NodeChanged(id));
        }

        let namespace = grouping_namespace(&key).map(String::from);
        if namespace.is_none() && !self.ctx.show_cluster_scoped {
            return None;
        }
        if tree.sentinel().is_some() {
            *tree = Tree::new();
        }

        let id = self.insert_resource(tree, resource);
        let Some(namespace) = namespace else {
            let label = tree.get(id).map(|n| n.label.clone()).unwrap_or_default();
            let index = residual_index(tree, &label, &key);
            if let Err(e) = tree.insert_root(index, id) {
                tracing::warn!("Failed to place {}: {}", key, e);
            }
            return Some(TreeChange::NodeChanged(id));
        };

        let group = match tree.find_namespace_root(&namespace) {
            Some(group) => group,
            None => {
                let known = self.ctx.namespaces.get().unwrap_or_default();
                let index = group_index(tree, &known, &namespace);
                let group = tree.insert(Node::namespace(namespace.as_str()));
                if let Err(e) = tree.insert_root(index, group) {
                    tracing::warn!("Failed to add group {}: {}", namespace, e);
                }
                group
            }
        };
        if let Err(e) = tree.add_child(group, id) {
            tracing::warn!("Failed to attach {} to {}: {}", key, namespace, e);
        }
        tree.sort_children(group);
        refresh_group(tree, group);
        Some(TreeChange::NodeChanged(group))
    }

    fn replace_resource(&self, tree: &mut Tree, parent: Option<NodeId>, id: NodeId, resource: Resource) {
        let rule = self.ctx.registry.status_rule(&resource.kind);
        if let Some(node) = tree.get_mut(id) {
            node.payload = NodePayload::Resource(resource);
        }
        update_status(tree, id, rule);
        if let Some(group) = parent {
            refresh_group(tree, group);
        }
    }

    fn delete_from(&self, tree: &mut Tree, key: &ResourceKey) -> Option<TreeChange> {
        let Some((parent, id)) = locate(tree, key) else {
            tracing::debug!("Delete of unknown {} ignored", key);
            return None;
        };
        tree.remove_subtree(id);

        let mut removed = id;
        if let Some(group) = parent {
            if !tree.children(group).is_empty() {
                refresh_group(tree, group);
                return Some(TreeChange::NodeChanged(group));
            }
            tree.remove_subtree(group);
            removed = group;
        }
        if tree.is_empty() {
            *tree = Tree::with_sentinel(Sentinel::NoResources);
        }
        Some(TreeChange::NodeRemoved(removed))
    }

    // ========================================================================
    // Expand / collapse
    // ========================================================================

    /// Expand a node. An expandable workload loads its dependency tree the
    /// first time; failures show up as a placeholder child.
    pub async fn expand(&self, id: NodeId) -> Result<(), TreeError> {
        let request = {
            let mut state = self.state.lock();
            let tree = &mut state.tree;
            let node = tree.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
            if node.expand_state == ExpandState::Leaf {
                return Ok(());
            }
            node.expand_state = ExpandState::Expanded;
            let request = node
                .resource_ref()
                .filter(|r| !node.children_loaded && self.ctx.registry.is_expandable(&r.kind))
                .map(|r| (r.kind.clone(), r.name().to_string(), r.namespace().unwrap_or("").to_string()));
            refresh_group(tree, id);

            let in_flight = tree
                .child_nodes(id)
                .iter()
                .any(|c| c.payload == NodePayload::Sentinel(Sentinel::Loading));
            if request.is_some() && !in_flight {
                tree.clear_children(id);
                let placeholder = tree.insert(Node::sentinel(Sentinel::Loading));
                tree.add_child(id, placeholder)?;
            }
            request.filter(|_| !in_flight)
        };
        self.notify(TreeChange::NodeChanged(id));

        let Some((kind, name, namespace)) = request else {
            return Ok(());
        };
        let start = Instant::now();
        let mut guard = ExpandGuard {
            provider: self,
            node: Some(id),
        };
        let fetched = self.ctx.fetcher.dependency_tree(&kind, &name, &namespace).await;
        guard.node = None;

        {
            let mut state = self.state.lock();
            let tree = &mut state.tree;
            if tree.get(id).is_none() {
                tracing::debug!("{} {} was replaced while loading its dependencies", kind, name);
                return Ok(());
            }
            match fetched {
                Ok(dependencies) if dependencies.resources.is_empty() => {
                    tree.clear_children(id);
                    let placeholder = tree.insert(Node::sentinel(Sentinel::NoResources));
                    tree.add_child(id, placeholder)?;
                    if let Some(node) = tree.get_mut(id) {
                        node.children_loaded = true;
                    }
                }
                Ok(dependencies) => {
                    let known = self.ctx.namespaces.get().unwrap_or_default();
                    let flattener =
                        DependencyFlattener::new(&self.ctx.registry, &known, self.ctx.max_dependency_depth);
                    let created = flattener.attach_to(tree, id, &dependencies.resources, &namespace)?;
                    tracing::debug!(
                        "Loaded {} dependency nodes for {} {} in {:?}",
                        created,
                        kind,
                        name,
                        start.elapsed()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to load dependencies of {} {}: {}", kind, name, e);
                    tree.clear_children(id);
                    let placeholder = tree.insert(Node::sentinel(Sentinel::FailedToLoad));
                    tree.add_child(id, placeholder)?;
                }
            }
        }
        self.notify(TreeChange::NodeChanged(id));
        Ok(())
    }

    pub fn collapse(&self, id: NodeId) -> Result<(), TreeError> {
        {
            let mut state = self.state.lock();
            let tree = &mut state.tree;
            let node = tree.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
            if node.expand_state == ExpandState::Leaf {
                return Ok(());
            }
            node.expand_state = ExpandState::Collapsed;
            refresh_group(tree, id);
        }
        self.notify(TreeChange::NodeChanged(id));
        Ok(())
    }

    fn notify(&self, change: TreeChange) {
        let Some(events) = &self.ctx.events else {
            return;
        };
        let event = TreeEvent {
            category: self.category,
            change,
        };
        if let Err(e) = events.try_send(event) {
            tracing::debug!("Dropped tree event: {}", e);
        }
    }
}

/// Namespace an object groups under at the root level
fn grouping_namespace(key: &ResourceKey) -> Option<&str> {
    if key.namespace.is_empty() || key.kind == "Namespace" {
        None
    } else {
        Some(&key.namespace)
    }
}

/// Parent group (if any) and node id of the root-level object with `key`
fn locate(tree: &Tree, key: &ResourceKey) -> Option<(Option<NodeId>, NodeId)> {
    match grouping_namespace(key) {
        Some(namespace) => {
            let group = tree.find_namespace_root(namespace)?;
            tree.find_child_by_resource(Some(group), key).map(|id| (Some(group), id))
        }
        None => tree.find_child_by_resource(None, key).map(|id| (None, id)),
    }
}

/// Root index for a new group: before the first later group or any
/// ungrouped root
fn group_index(tree: &Tree, namespaces: &[String], namespace: &str) -> usize {
    tree.root_nodes()
        .iter()
        .position(|node| match node.namespace_name() {
            Some(existing) => compare_namespaces(namespaces, existing, namespace).is_gt(),
            None => true,
        })
        .unwrap_or(tree.roots().len())
}

/// Root index for an ungrouped node, keeping the residual in the order a
/// reload would produce: label first, identity key on ties
fn residual_index(tree: &Tree, label: &str, key: &ResourceKey) -> usize {
    tree.root_nodes()
        .iter()
        .position(|node| {
            !node.is_namespace()
                && node
                    .label
                    .as_str()
                    .cmp(label)
                    .then_with(|| node.key().as_ref().cmp(&Some(key)))
                    .is_gt()
        })
        .unwrap_or(tree.roots().len())
}
