//! Kubernetes API client
//!
//! Wraps the kube crate to list namespaces and Flux custom resources.

use std::collections::HashMap;
use std::sync::OnceLock;
use kube::{
    api::{Api, ApiResource, DynamicObject, ListParams},
    core::GroupVersionKind,
    Client, Config,
};
use k8s_openapi::api::core::v1::Namespace;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::resource::{KindSpec, Resource, ResourceMeta, ResourceStatus};

/// Global client cache - avoids recreating clients (expensive TLS handshake) for each request
static CLIENT_CACHE: OnceLock<RwLock<HashMap<String, Client>>> = OnceLock::new();

fn get_client_cache() -> &'static RwLock<HashMap<String, Client>> {
    CLIENT_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Debug, Error)]
pub enum KubeClientError {
    #[error("Failed to create client: {0}")]
    ClientError(#[from] kube::Error),
    #[error("Failed to load config: {0}")]
    ConfigError(#[from] kube::config::KubeconfigError),
    #[error("Failed to infer config: {0}")]
    InferError(#[from] kube::config::InferConfigError),
}

/// A Kubernetes namespace
#[derive(Debug, Clone)]
pub struct KubeNamespace {
    pub name: String,
    pub status: String,
}

/// Kubernetes API client
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    context_name: String,
}

impl KubeClient {
    /// Create a new client using the default kubeconfig and current context
    pub async fn new() -> Result<Self, KubeClientError> {
        let config = Config::infer().await?;
        let client = Client::try_from(config)?;
        Ok(Self {
            client,
            context_name: "current".to_string(),
        })
    }

    /// Create a client for a specific context (cached for performance)
    pub async fn for_context(context_name: &str) -> Result<Self, KubeClientError> {
        let cache = get_client_cache();

        {
            let read_guard = cache.read().await;
            if let Some(client) = read_guard.get(context_name) {
                tracing::debug!("K8s client cache HIT for {}", context_name);
                return Ok(Self {
                    client: client.clone(),
                    context_name: context_name.to_string(),
                });
            }
        }

        tracing::info!("K8s client cache MISS for {} - creating new client", context_name);
        let start = std::time::Instant::now();

        let options = kube::config::KubeConfigOptions {
            context: Some(context_name.to_string()),
            ..Default::default()
        };
        let config = Config::from_kubeconfig(&options).await?;
        let client = Client::try_from(config)?;

        {
            let mut write_guard = cache.write().await;
            write_guard.insert(context_name.to_string(), client.clone());
        }

        tracing::info!("K8s client for {} created in {:?}", context_name, start.elapsed());

        Ok(Self {
            client,
            context_name: context_name.to_string(),
        })
    }

    /// Get the context name this client is connected to
    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    /// List all namespaces
    pub async fn list_namespaces(&self) -> Result<Vec<KubeNamespace>, KubeClientError> {
        let start = std::time::Instant::now();
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&ListParams::default()).await?;
        tracing::debug!("list_namespaces API call took {:?}", start.elapsed());

        Ok(list.items.into_iter().map(|ns| {
            let name = ns.metadata.name.unwrap_or_default();
            let status = ns.status
                .and_then(|s| s.phase)
                .unwrap_or_else(|| "Unknown".to_string());
            KubeNamespace { name, status }
        }).collect())
    }

    /// List every object of one custom resource kind across all namespaces
    pub async fn list_resources(&self, spec: &KindSpec) -> Result<Vec<Resource>, KubeClientError> {
        let start = std::time::Instant::now();
        let gvk = GroupVersionKind::gvk(&spec.group, &spec.version, &spec.kind);
        let api_resource = ApiResource::from_gvk_with_plural(&gvk, &spec.plural);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
        let list = api.list(&ListParams::default()).await?;
        tracing::debug!(
            "list {} API call returned {} items in {:?}",
            spec.plural,
            list.items.len(),
            start.elapsed()
        );

        Ok(list
            .items
            .into_iter()
            .map(|obj| Self::convert_object(&spec.kind, obj))
            .collect())
    }

    /// Convert a dynamic object to our Resource type. List items usually
    /// carry no `kind`, so the requested one is used.
    fn convert_object(kind: &str, obj: DynamicObject) -> Resource {
        let name = obj.metadata.name.unwrap_or_default();
        let status = obj.data.get("status").cloned().and_then(|status| {
            serde_json::from_value::<ResourceStatus>(status)
                .map_err(|e| tracing::warn!("Ignoring malformed status on {} {}: {}", kind, name, e))
                .ok()
        });

        Resource {
            kind: kind.to_string(),
            metadata: ResourceMeta {
                name,
                namespace: obj.metadata.namespace,
                uid: obj.metadata.uid,
            },
            spec: obj.data.get("spec").cloned(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    #[test]
    fn test_convert_object() {
        let obj = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("podinfo".into()),
                namespace: Some("flux-system".into()),
                uid: Some("1234".into()),
                ..Default::default()
            },
            data: serde_json::json!({
                "spec": {"interval": "1m", "suspend": false},
                "status": {"conditions": [{"type": "Ready", "status": "True", "reason": "Succeeded"}]}
            }),
        };

        let resource = KubeClient::convert_object("GitRepository", obj);
        assert_eq!(resource.kind, "GitRepository");
        assert_eq!(resource.name(), "podinfo");
        assert_eq!(resource.namespace(), Some("flux-system"));
        assert_eq!(resource.metadata.uid.as_deref(), Some("1234"));
        assert_eq!(resource.conditions().len(), 1);
        assert!(!resource.is_suspended());
    }

    #[test]
    fn test_convert_object_malformed_status() {
        let obj = DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some("broken".into()),
                ..Default::default()
            },
            data: serde_json::json!({"status": {"conditions": "nope"}}),
        };

        let resource = KubeClient::convert_object("Bucket", obj);
        assert!(resource.status.is_none());
        assert_eq!(resource.namespace(), None);
    }
}
