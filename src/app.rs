use std::sync::Arc;

use async_channel::Receiver;
use thiserror::Error;

use crate::config::AppConfig;
use crate::provider::{
    ChangeOutcome, DataProvider, Fetcher, NamespaceCache, ProviderContext, ReloadOutcome, TreeEvent,
};
use crate::resource::{Category, KindRegistry, RegistryError, Resource};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid kind configuration: {0}")]
    Registry(#[from] RegistryError),
}

/// The three category providers wired to one fetcher, one namespace cache
/// and one event channel
pub struct FluxViewApp {
    /// Application configuration
    pub config: AppConfig,
    registry: Arc<KindRegistry>,
    namespaces: Arc<NamespaceCache>,
    sources: DataProvider,
    workloads: DataProvider,
    clusters: DataProvider,
    events: Receiver<TreeEvent>,
}

impl FluxViewApp {
    /// Create the providers with the built-in Flux kinds
    pub fn new(config: AppConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, AppError> {
        Self::with_registry(config, KindRegistry::flux(), fetcher)
    }

    /// Create the providers over a custom registry. Fails if the configured
    /// kinds are not registered under their category.
    pub fn with_registry(config: AppConfig, registry: KindRegistry, fetcher: Arc<dyn Fetcher>) -> Result<Self, AppError> {
        let registry = Arc::new(registry);
        let namespaces = Arc::new(NamespaceCache::new());
        let (sender, events) = async_channel::unbounded();

        let mut ctx = ProviderContext::new(registry.clone(), fetcher, namespaces.clone()).with_events(sender);
        ctx.max_dependency_depth = config.max_dependency_depth;
        ctx.show_cluster_scoped = config.show_cluster_scoped;

        let sources = DataProvider::new(Category::Sources, &config.source_kinds, ctx.clone())?;
        let workloads = DataProvider::new(Category::Workloads, &config.workload_kinds, ctx.clone())?;
        let clusters = DataProvider::clusters(ctx);

        tracing::info!(
            "Created providers: {} source kinds, {} workload kinds",
            sources.kinds().len(),
            workloads.kinds().len()
        );

        Ok(Self {
            config,
            registry,
            namespaces,
            sources,
            workloads,
            clusters,
            events,
        })
    }

    pub fn provider(&self, category: Category) -> &DataProvider {
        match category {
            Category::Sources => &self.sources,
            Category::Workloads => &self.workloads,
            Category::Clusters => &self.clusters,
        }
    }

    pub fn providers(&self) -> [&DataProvider; 3] {
        [&self.sources, &self.workloads, &self.clusters]
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn namespaces(&self) -> &NamespaceCache {
        &self.namespaces
    }

    /// Redraw notifications from every provider
    pub fn events(&self) -> &Receiver<TreeEvent> {
        &self.events
    }

    /// Reload every provider concurrently
    pub async fn reload_all(&self) -> [(Category, ReloadOutcome); 3] {
        let (sources, workloads, clusters) =
            futures::join!(self.sources.reload(), self.workloads.reload(), self.clusters.reload());
        [
            (Category::Sources, sources),
            (Category::Workloads, workloads),
            (Category::Clusters, clusters),
        ]
    }

    /// Drop the cached namespace list, then reload everything
    pub async fn refresh(&self) -> [(Category, ReloadOutcome); 3] {
        self.namespaces.invalidate();
        self.reload_all().await
    }

    /// Provider whose tree holds objects of `kind`
    fn route(&self, kind: &str) -> Option<&DataProvider> {
        let category = self.registry.lookup(kind)?.category;
        Some(self.provider(category))
    }

    pub fn add(&self, resource: Resource) -> ChangeOutcome {
        match self.route(&resource.kind) {
            Some(provider) => provider.add(resource),
            None => ChangeOutcome::Ignored,
        }
    }

    pub fn update(&self, resource: Resource) -> ChangeOutcome {
        match self.route(&resource.kind) {
            Some(provider) => provider.update(resource),
            None => ChangeOutcome::Ignored,
        }
    }

    pub fn delete(&self, resource: &Resource) -> ChangeOutcome {
        match self.route(&resource.kind) {
            Some(provider) => provider.delete(resource),
            None => ChangeOutcome::Ignored,
        }
    }
}
