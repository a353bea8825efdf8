use serde::{Deserialize, Deserializer, Serialize};

/// One entry of `status.conditions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: status.into(),
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// `status.conditions` may be a single object or a list
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Condition),
        Many(Vec<Condition>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(condition)) => vec![condition],
        Some(OneOrMany::Many(conditions)) => conditions,
        None => Vec::new(),
    })
}

/// Object status, reduced to what the tree needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    #[serde(default, deserialize_with = "one_or_many")]
    pub conditions: Vec<Condition>,
}

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// A cluster object as returned by the fetch layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub metadata: ResourceMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl Resource {
    /// Create a bare object with no spec or status
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            metadata: ResourceMeta {
                name: name.into(),
                namespace: namespace.filter(|ns| !ns.is_empty()).map(String::from),
                uid: None,
            },
            spec: None,
            status: None,
        }
    }

    /// Replace the condition list
    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.status = Some(ResourceStatus { conditions });
        self
    }

    pub fn with_spec(mut self, spec: serde_json::Value) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Namespace, or None for cluster-scoped (or malformed) objects
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// `spec.suspend == true`
    pub fn is_suspended(&self) -> bool {
        self.spec
            .as_ref()
            .and_then(|spec| spec.get("suspend"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Identity used for de-duplication and incremental updates
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.kind, self.namespace().unwrap_or(""), &self.metadata.name)
    }
}

/// `(kind, namespace, name)`; namespace is empty for cluster-scoped objects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// A kubeconfig context, shown by the clusters view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    pub name: String,
    pub cluster: String,
    pub server: Option<String>,
    pub namespace: Option<String>,
    pub current: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_single_object() {
        let json = r#"{
            "kind": "GitRepository",
            "metadata": {"name": "podinfo", "namespace": "flux-system"},
            "status": {"conditions": {"type": "Ready", "status": "True", "reason": "Succeeded"}}
        }"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.conditions().len(), 1);
        assert_eq!(resource.conditions()[0].reason.as_deref(), Some("Succeeded"));
    }

    #[test]
    fn test_conditions_list_and_missing() {
        let json = r#"{
            "kind": "Kustomization",
            "metadata": {"name": "apps", "namespace": "flux-system"},
            "spec": {"suspend": true, "interval": "10m"},
            "status": {"conditions": [
                {"type": "Reconciling", "status": "True"},
                {"type": "Ready", "status": "Unknown", "reason": "Progressing",
                 "lastTransitionTime": "2024-01-01T00:00:00Z"}
            ]}
        }"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.conditions().len(), 2);
        assert!(resource.is_suspended());

        let bare: Resource =
            serde_json::from_str(r#"{"kind": "Bucket", "metadata": {"name": "b"}, "status": {}}"#).unwrap();
        assert!(bare.conditions().is_empty());
        assert!(!bare.is_suspended());
    }

    #[test]
    fn test_key_treats_empty_namespace_as_cluster_scoped() {
        let mut resource = Resource::new("Namespace", "default", None);
        resource.metadata.namespace = Some(String::new());
        assert_eq!(resource.namespace(), None);
        assert_eq!(resource.key(), ResourceKey::new("Namespace", "", "default"));
        assert_eq!(resource.key().to_string(), "Namespace/default");
    }
}
