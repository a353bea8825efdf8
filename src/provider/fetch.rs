//! Fetch collaborator
//!
//! Everything the providers read from outside the process goes through the
//! [`Fetcher`] trait, so tests can script the cluster.

use async_trait::async_trait;
use fluxview_flux::{DependencyTree, FluxCli, FluxError};
use thiserror::Error;

use crate::config::AppConfig;
use crate::kubernetes::{KubeClient, KubeClientError, KubeConfig, KubeConfigError};
use crate::resource::{ClusterContext, KindSpec, Resource};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] KubeClientError),

    #[error("Kubeconfig error: {0}")]
    KubeConfig(#[from] KubeConfigError),

    #[error("flux CLI error: {0}")]
    Flux(#[from] FluxError),

    #[error("{kind} has no dependency tree")]
    NotExpandable { kind: String },

    #[error("{0}")]
    Other(String),
}

/// Source of cluster data for the providers
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Names of every namespace in the cluster
    async fn list_namespaces(&self) -> Result<Vec<String>, FetchError>;

    /// All objects of one kind, across namespaces
    async fn list(&self, kind: &KindSpec) -> Result<Vec<Resource>, FetchError>;

    /// Kubeconfig contexts
    async fn list_contexts(&self) -> Result<Vec<ClusterContext>, FetchError>;

    /// Objects managed by one workload; the root entry is the workload itself
    async fn dependency_tree(&self, kind: &str, name: &str, namespace: &str) -> Result<DependencyTree, FetchError>;
}

/// Production fetcher: kube API for listings, kubeconfig for contexts and
/// the flux CLI for dependency trees
pub struct ClusterFetcher {
    context: Option<String>,
    flux: FluxCli,
}

impl ClusterFetcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            context: config.kube_context.clone(),
            flux: FluxCli::with_path(&config.flux_path).with_context(config.kube_context.clone()),
        }
    }

    async fn client(&self) -> Result<KubeClient, KubeClientError> {
        match &self.context {
            Some(context) => KubeClient::for_context(context).await,
            None => KubeClient::new().await,
        }
    }
}

#[async_trait]
impl Fetcher for ClusterFetcher {
    async fn list_namespaces(&self) -> Result<Vec<String>, FetchError> {
        let client = self.client().await?;
        let namespaces = client.list_namespaces().await?;
        Ok(namespaces.into_iter().map(|ns| ns.name).collect())
    }

    async fn list(&self, kind: &KindSpec) -> Result<Vec<Resource>, FetchError> {
        let client = self.client().await?;
        Ok(client.list_resources(kind).await?)
    }

    async fn list_contexts(&self) -> Result<Vec<ClusterContext>, FetchError> {
        let config = tokio::task::spawn_blocking(KubeConfig::load_default)
            .await
            .map_err(|e| FetchError::Other(format!("kubeconfig task failed: {}", e)))??;
        Ok(config.cluster_contexts())
    }

    async fn dependency_tree(&self, kind: &str, name: &str, namespace: &str) -> Result<DependencyTree, FetchError> {
        let workload = fluxview_flux::WorkloadKind::from_kind(kind).ok_or_else(|| FetchError::NotExpandable {
            kind: kind.to_string(),
        })?;
        Ok(self.flux.tree(workload, name, namespace).await?)
    }
}
