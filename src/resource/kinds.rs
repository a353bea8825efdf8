use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;

use super::models::Resource;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Kind already registered: {0}")]
    DuplicateKind(String),
    #[error("Invalid kind name: {0:?}")]
    InvalidKind(String),
    #[error("Unknown kind: {0}")]
    UnknownKind(String),
    #[error("Kind {kind} belongs to {actual:?}, not {expected:?}")]
    WrongCategory {
        kind: String,
        expected: Category,
        actual: Category,
    },
}

/// Resource category; each one gets its own provider and tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Sources,
    Workloads,
    Clusters,
}

impl Category {
    pub fn title(self) -> &'static str {
        match self {
            Category::Sources => "Sources",
            Category::Workloads => "Workloads",
            Category::Clusters => "Clusters",
        }
    }
}

/// How a kind's conditions map to a reconcile status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRule {
    /// Ready condition decides, everything else is failed
    Conditions,
    /// Like `Conditions`, but in-flight reasons show as progressing
    ConditionsWithProgress,
    /// No status indicator
    Untracked,
}

/// Behavior attached to one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: String,
    pub group: String,
    pub version: String,
    /// Lowercase plural used in API paths
    pub plural: String,
    pub category: Category,
    pub status_rule: StatusRule,
    /// Whether nodes of this kind can load children (dependency trees)
    pub expandable: bool,
}

impl KindSpec {
    pub fn source(kind: &str, version: &str, plural: &str) -> Self {
        Self {
            kind: kind.to_string(),
            group: "source.toolkit.fluxcd.io".to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
            category: Category::Sources,
            status_rule: StatusRule::Conditions,
            expandable: false,
        }
    }

    pub fn workload(kind: &str, group: &str, version: &str, plural: &str) -> Self {
        Self {
            kind: kind.to_string(),
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
            category: Category::Workloads,
            status_rule: StatusRule::ConditionsWithProgress,
            expandable: true,
        }
    }
}

fn kind_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("static regex"))
}

/// Explicit kind → behavior table
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: HashMap<String, KindSpec>,
    /// Registration order, used for fetch fan-out
    order: Vec<String>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the Flux source and workload kinds
    pub fn flux() -> Self {
        let mut registry = Self::new();
        let builtin = [
            KindSpec::source("GitRepository", "v1", "gitrepositories"),
            KindSpec::source("OCIRepository", "v1beta2", "ocirepositories"),
            KindSpec::source("HelmRepository", "v1", "helmrepositories"),
            KindSpec::source("Bucket", "v1", "buckets"),
            KindSpec::workload("Kustomization", "kustomize.toolkit.fluxcd.io", "v1", "kustomizations"),
            KindSpec::workload("HelmRelease", "helm.toolkit.fluxcd.io", "v2", "helmreleases"),
        ];
        for spec in builtin {
            // the table above has no duplicates
            let _ = registry.register(spec);
        }
        registry
    }

    /// Add a kind; fails on duplicates and malformed names
    pub fn register(&mut self, spec: KindSpec) -> Result<(), RegistryError> {
        if !kind_pattern().is_match(&spec.kind) {
            return Err(RegistryError::InvalidKind(spec.kind));
        }
        if self.kinds.contains_key(&spec.kind) {
            return Err(RegistryError::DuplicateKind(spec.kind));
        }
        self.order.push(spec.kind.clone());
        self.kinds.insert(spec.kind.clone(), spec);
        Ok(())
    }

    pub fn lookup(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    pub fn get(&self, kind: &str) -> Result<&KindSpec, RegistryError> {
        self.lookup(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    /// Registered kinds of one category, in registration order
    pub fn kinds_for(&self, category: Category) -> Vec<&KindSpec> {
        self.order
            .iter()
            .filter_map(|kind| self.kinds.get(kind))
            .filter(|spec| spec.category == category)
            .collect()
    }

    /// Resolve a configured kind list, failing on anything unknown or misfiled
    pub fn select(&self, category: Category, kinds: &[String]) -> Result<Vec<KindSpec>, RegistryError> {
        kinds
            .iter()
            .map(|kind| {
                let spec = self.get(kind)?;
                if spec.category != category {
                    return Err(RegistryError::WrongCategory {
                        kind: kind.clone(),
                        expected: category,
                        actual: spec.category,
                    });
                }
                Ok(spec.clone())
            })
            .collect()
    }

    /// Status rule for a kind; unregistered kinds are untracked
    pub fn status_rule(&self, kind: &str) -> StatusRule {
        self.lookup(kind)
            .map(|spec| spec.status_rule)
            .unwrap_or(StatusRule::Untracked)
    }

    /// Display label: bare name for registered kinds, `Kind: name` otherwise
    pub fn label(&self, resource: &Resource) -> String {
        if self.kinds.contains_key(&resource.kind) {
            resource.name().to_string()
        } else {
            format!("{}: {}", resource.kind, resource.name())
        }
    }

    pub fn is_expandable(&self, kind: &str) -> bool {
        self.lookup(kind).map(|spec| spec.expandable).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flux_registry_categories() {
        let registry = KindRegistry::flux();
        let sources: Vec<_> = registry
            .kinds_for(Category::Sources)
            .into_iter()
            .map(|s| s.kind.as_str())
            .collect();
        assert_eq!(sources, ["GitRepository", "OCIRepository", "HelmRepository", "Bucket"]);
        assert_eq!(registry.kinds_for(Category::Workloads).len(), 2);
        assert!(registry.is_expandable("Kustomization"));
        assert!(!registry.is_expandable("Bucket"));
        assert!(!registry.is_expandable("Deployment"));
    }

    #[test]
    fn test_register_fails_fast() {
        let mut registry = KindRegistry::flux();
        assert_eq!(
            registry.register(KindSpec::source("GitRepository", "v1", "gitrepositories")),
            Err(RegistryError::DuplicateKind("GitRepository".into()))
        );
        assert_eq!(
            registry.register(KindSpec::source("git repo", "v1", "x")),
            Err(RegistryError::InvalidKind("git repo".into()))
        );
        assert!(registry
            .register(KindSpec::workload("ResourceSet", "fluxcd.controlplane.io", "v1", "resourcesets"))
            .is_ok());
    }

    #[test]
    fn test_select_validates_category() {
        let registry = KindRegistry::flux();
        let picked = registry
            .select(Category::Sources, &["Bucket".into(), "GitRepository".into()])
            .unwrap();
        assert_eq!(picked[0].kind, "Bucket");

        assert!(matches!(
            registry.select(Category::Sources, &["HelmRelease".into()]),
            Err(RegistryError::WrongCategory { .. })
        ));
        assert_eq!(
            registry.select(Category::Workloads, &["Pipeline".into()]),
            Err(RegistryError::UnknownKind("Pipeline".into()))
        );
    }

    #[test]
    fn test_labels() {
        let registry = KindRegistry::flux();
        let repo = Resource::new("GitRepository", "podinfo", Some("flux-system"));
        let deploy = Resource::new("Deployment", "podinfo", Some("apps"));
        assert_eq!(registry.label(&repo), "podinfo");
        assert_eq!(registry.label(&deploy), "Deployment: podinfo");
        assert_eq!(registry.status_rule("Deployment"), StatusRule::Untracked);
    }
}
