//! Kubeconfig parsing
//!
//! Reads kubeconfig files (typically ~/.kube/config) to list the contexts
//! shown by the clusters view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::resource::ClusterContext;

#[derive(Debug, Error)]
pub enum KubeConfigError {
    #[error("Failed to read kubeconfig: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse kubeconfig: {0}")]
    ParseError(String),
    #[error("No kubeconfig found")]
    NotFound,
}

/// A named context entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
}

/// Parsed kubeconfig
#[derive(Debug, Clone)]
pub struct KubeConfig {
    pub path: PathBuf,
    pub current_context: Option<String>,
    pub contexts: Vec<KubeContext>,
    /// Cluster name -> API server URL
    pub servers: HashMap<String, String>,
}

impl KubeConfig {
    /// Load kubeconfig from the default location
    pub fn load_default() -> Result<Self, KubeConfigError> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// First existing entry of `KUBECONFIG`, else ~/.kube/config
    pub fn default_path() -> Result<PathBuf, KubeConfigError> {
        if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
            let found = std::env::split_paths(&kubeconfig).find(|p| p.exists());
            if let Some(path) = found {
                return Ok(path);
            }
        }

        let home = dirs::home_dir().ok_or(KubeConfigError::NotFound)?;
        let path = home.join(".kube").join("config");
        if path.exists() {
            Ok(path)
        } else {
            Err(KubeConfigError::NotFound)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, KubeConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path.to_path_buf())
    }

    fn parse(content: &str, path: PathBuf) -> Result<Self, KubeConfigError> {
        let yaml: serde_json::Value = serde_yaml_ng::from_str(content)
            .map_err(|e| KubeConfigError::ParseError(e.to_string()))?;

        let current_context = yaml.get("current-context")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);

        let mut servers = HashMap::new();
        for cluster in yaml.get("clusters").and_then(|v| v.as_array()).into_iter().flatten() {
            let name = cluster.get("name").and_then(|v| v.as_str());
            let server = cluster.pointer("/cluster/server").and_then(|v| v.as_str());
            if let (Some(name), Some(server)) = (name, server) {
                servers.insert(name.to_string(), server.to_string());
            }
        }

        let mut contexts = Vec::new();
        for context in yaml.get("contexts").and_then(|v| v.as_array()).into_iter().flatten() {
            let (Some(name), Some(data)) = (
                context.get("name").and_then(|v| v.as_str()),
                context.get("context"),
            ) else {
                continue;
            };
            let field = |key: &str| data.get(key).and_then(|v| v.as_str()).map(String::from);
            contexts.push(KubeContext {
                name: name.to_string(),
                cluster: field("cluster").unwrap_or_default(),
                user: field("user").unwrap_or_default(),
                namespace: field("namespace"),
            });
        }

        tracing::debug!("Parsed {} contexts from {}", contexts.len(), path.display());

        Ok(Self {
            path,
            current_context,
            contexts,
            servers,
        })
    }

    pub fn current_context(&self) -> Option<&KubeContext> {
        self.current_context.as_ref()
            .and_then(|name| self.contexts.iter().find(|c| &c.name == name))
    }

    pub fn get_context(&self, name: &str) -> Option<&KubeContext> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Contexts in file order, as shown by the clusters view
    pub fn cluster_contexts(&self) -> Vec<ClusterContext> {
        self.contexts
            .iter()
            .map(|ctx| ClusterContext {
                name: ctx.name.clone(),
                cluster: ctx.cluster.clone(),
                server: self.servers.get(&ctx.cluster).cloned(),
                namespace: ctx.namespace.clone(),
                current: self.current_context.as_deref() == Some(ctx.name.as_str()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
clusters:
- name: staging
  cluster:
    server: https://staging.example.com:6443
    certificate-authority-data: LS0tLS1CRUdJTg==
- name: production
  cluster:
    server: https://k8s.example.com:6443
contexts:
- name: staging
  context:
    cluster: staging
    user: flux-admin
    namespace: flux-system
- name: production
  context:
    cluster: production
    user: admin
- name: orphan
  context:
    cluster: missing
    user: nobody
users:
- name: flux-admin
  user:
    token: abc
"#;

    #[test]
    fn test_parse_kubeconfig() {
        let config = KubeConfig::parse(KUBECONFIG, PathBuf::from("/test/config")).unwrap();

        assert_eq!(config.current_context.as_deref(), Some("staging"));
        assert_eq!(config.contexts.len(), 3);
        assert_eq!(config.servers.len(), 2);

        let ctx = config.current_context().unwrap();
        assert_eq!(ctx.cluster, "staging");
        assert_eq!(ctx.namespace.as_deref(), Some("flux-system"));
        assert_eq!(config.get_context("production").unwrap().user, "admin");
    }

    #[test]
    fn test_cluster_contexts() {
        let config = KubeConfig::parse(KUBECONFIG, PathBuf::from("/test/config")).unwrap();
        let contexts = config.cluster_contexts();

        let names: Vec<_> = contexts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["staging", "production", "orphan"]);
        assert!(contexts[0].current);
        assert!(!contexts[1].current);
        assert_eq!(contexts[1].server.as_deref(), Some("https://k8s.example.com:6443"));
        assert_eq!(contexts[2].server, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let config = KubeConfig::load_from(&path).unwrap();
        assert_eq!(config.path, path);
        assert!(matches!(
            KubeConfig::load_from(&dir.path().join("missing")),
            Err(KubeConfigError::ReadError(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            KubeConfig::parse("clusters: [", PathBuf::from("/bad")),
            Err(KubeConfigError::ParseError(_))
        ));
    }
}
