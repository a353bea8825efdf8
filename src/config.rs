use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Kubeconfig context to browse; the current context when unset
    #[serde(default)]
    pub kube_context: Option<String>,

    /// flux executable, looked up on PATH unless absolute
    #[serde(default = "default_flux_path")]
    pub flux_path: String,

    /// Nesting limit when flattening dependency trees
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,

    /// Kinds listed by the sources view
    #[serde(default = "default_source_kinds")]
    pub source_kinds: Vec<String>,

    /// Kinds listed by the workloads view
    #[serde(default = "default_workload_kinds")]
    pub workload_kinds: Vec<String>,

    /// Whether objects outside any namespace are shown below the groups
    #[serde(default = "default_true")]
    pub show_cluster_scoped: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            kube_context: None,
            flux_path: default_flux_path(),
            max_dependency_depth: default_max_dependency_depth(),
            source_kinds: default_source_kinds(),
            workload_kinds: default_workload_kinds(),
            show_cluster_scoped: true,
        }
    }
}

fn default_flux_path() -> String {
    "flux".to_string()
}

fn default_max_dependency_depth() -> usize {
    16
}

fn default_source_kinds() -> Vec<String> {
    ["GitRepository", "OCIRepository", "HelmRepository", "Bucket"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_workload_kinds() -> Vec<String> {
    vec!["Kustomization".to_string(), "HelmRelease".to_string()]
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("fluxview");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reset to defaults and save
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        *self = Self::default();
        self.save()
    }
}
