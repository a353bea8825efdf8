//! flux CLI invocation
//!
//! Runs `flux tree` as a child process and decodes its JSON output.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex_lite::Regex;
use tokio::process::Command;

use crate::protocol::{parse_tree, DependencyTree, WorkloadKind};

/// Error type for flux CLI operations
#[derive(Debug, thiserror::Error)]
pub enum FluxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Spawn error: {0}")]
    SpawnError(String),
    #[error("flux exited with {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },
    #[error("Invalid object name: {0:?}")]
    InvalidName(String),
    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),
}

pub type Result<T> = std::result::Result<T, FluxError>;

/// DNS-1123 subdomain, max 253 characters
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("static regex")
    })
}

/// DNS-1123 label, max 63 characters
fn namespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"))
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > 253 || !name_pattern().is_match(name) {
        return Err(FluxError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.len() > 63 || !namespace_pattern().is_match(namespace) {
        return Err(FluxError::InvalidNamespace(namespace.to_string()));
    }
    Ok(())
}

/// Handle to the flux binary
#[derive(Debug, Clone)]
pub struct FluxCli {
    /// Path or name of the flux executable
    path: PathBuf,
    /// kubeconfig context passed as `--context`
    context: Option<String>,
}

impl FluxCli {
    /// Use `flux` from `PATH` with the current kubeconfig context
    pub fn new() -> Self {
        Self::with_path("flux")
    }

    /// Use a specific flux executable
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            context: None,
        }
    }

    /// Pin the kubeconfig context
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Arguments for `flux tree`, after validation
    pub fn tree_args(&self, kind: WorkloadKind, name: &str, namespace: &str) -> Result<Vec<String>> {
        validate_name(name)?;
        validate_namespace(namespace)?;

        let mut args = vec![
            "tree".to_string(),
            kind.subcommand().to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "-o".to_string(),
            "json".to_string(),
        ];
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        Ok(args)
    }

    /// Fetch the dependency tree of a Kustomization or HelmRelease
    pub async fn tree(&self, kind: WorkloadKind, name: &str, namespace: &str) -> Result<DependencyTree> {
        let args = self.tree_args(kind, name, namespace)?;
        tracing::debug!("flux: running {:?} {:?}", self.path, args);
        let start = std::time::Instant::now();

        let output = Command::new(&self.path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FluxError::SpawnError(format!("Failed to spawn {:?}: {}", self.path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("flux tree {}/{} failed: {}", namespace, name, stderr);
            return Err(FluxError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tree = parse_tree(&stdout)?;
        tracing::debug!(
            "flux tree {}/{} returned {} entries in {:?}",
            namespace,
            name,
            tree.len(),
            start.elapsed()
        );
        Ok(tree)
    }
}

impl Default for FluxCli {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_args() {
        let cli = FluxCli::new().with_context(Some("kind-dev".into()));
        let args = cli
            .tree_args(WorkloadKind::HelmRelease, "podinfo", "apps")
            .unwrap();
        assert_eq!(
            args,
            vec!["tree", "helmrelease", "podinfo", "-n", "apps", "-o", "json", "--context", "kind-dev"]
        );
    }

    #[test]
    fn test_rejects_bad_names() {
        let cli = FluxCli::new();
        assert!(matches!(
            cli.tree_args(WorkloadKind::Kustomization, "--kubeconfig=/tmp/x", "default"),
            Err(FluxError::InvalidName(_))
        ));
        assert!(matches!(
            cli.tree_args(WorkloadKind::Kustomization, "apps", "Flux_System"),
            Err(FluxError::InvalidNamespace(_))
        ));
        assert!(validate_name("apps.v1.example").is_ok());
        assert!(validate_namespace(&"a".repeat(64)).is_err());
    }
}
