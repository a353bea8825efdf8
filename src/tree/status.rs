//! Reconcile status derivation and namespace rollups

use crate::resource::{Condition, Resource, StatusRule};

use super::models::{ExpandState, NodeId, NodePayload, Tree};

/// Condition reasons that mean "still working on it" for workloads
const PROGRESSING_REASONS: &[&str] = &["Progressing", "ProgressingWithRetry", "Reconciling"];

/// Readiness of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileStatus {
    Ready,
    Progressing,
    Failed,
}

/// The Ready condition, or the first one when there is no Ready entry
pub fn primary_condition(conditions: &[Condition]) -> Option<&Condition> {
    conditions
        .iter()
        .find(|c| c.condition_type == "Ready")
        .or_else(|| conditions.first())
}

/// Status of a resource under its kind's rule. Objects without any
/// condition count as failed.
pub fn derive_status(resource: &Resource, rule: StatusRule) -> Option<ReconcileStatus> {
    if rule == StatusRule::Untracked {
        return None;
    }

    let Some(condition) = primary_condition(resource.conditions()) else {
        return Some(ReconcileStatus::Failed);
    };

    if condition.is_true() {
        return Some(ReconcileStatus::Ready);
    }

    let progressing = rule == StatusRule::ConditionsWithProgress
        && condition
            .reason
            .as_deref()
            .is_some_and(|reason| PROGRESSING_REASONS.contains(&reason));

    Some(if progressing {
        ReconcileStatus::Progressing
    } else {
        ReconcileStatus::Failed
    })
}

/// Secondary text: suspension marker plus the primary condition message
pub fn describe(resource: &Resource) -> Option<String> {
    let message = primary_condition(resource.conditions())
        .and_then(|c| c.message.as_deref())
        .filter(|m| !m.is_empty());

    match (resource.is_suspended(), message) {
        (true, Some(message)) => Some(format!("Suspended · {}", message)),
        (true, None) => Some("Suspended".to_string()),
        (false, Some(message)) => Some(message.to_string()),
        (false, None) => None,
    }
}

/// Recompute status and description of a resource node after its resource changed
pub fn update_status(tree: &mut Tree, id: NodeId, rule: StatusRule) {
    let Some(node) = tree.get_mut(id) else {
        return;
    };
    if let NodePayload::Resource(resource) = &node.payload {
        node.status = derive_status(resource, rule);
        node.description = describe(resource);
    }
}

/// `ready/total` over the resource children of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollup {
    pub ready: usize,
    pub failed: usize,
    pub total: usize,
}

impl Rollup {
    /// Untracked children count as ready
    pub fn of(tree: &Tree, group: NodeId) -> Self {
        let mut rollup = Rollup {
            ready: 0,
            failed: 0,
            total: 0,
        };
        for child in tree.child_nodes(group) {
            if !matches!(child.payload, NodePayload::Resource(_)) {
                continue;
            }
            rollup.total += 1;
            match child.status {
                None | Some(ReconcileStatus::Ready) => rollup.ready += 1,
                Some(ReconcileStatus::Failed) => rollup.failed += 1,
                Some(ReconcileStatus::Progressing) => {}
            }
        }
        rollup
    }

    pub fn all_ready(&self) -> bool {
        self.ready == self.total
    }
}

impl std::fmt::Display for Rollup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.all_ready() {
            write!(f, "{}", self.total)
        } else {
            write!(f, "{}/{}", self.ready, self.total)
        }
    }
}

/// Group label: rollup while collapsed, bare namespace while expanded
pub fn group_label(namespace: &str, state: ExpandState, rollup: Rollup) -> String {
    match state {
        ExpandState::Expanded => namespace.to_string(),
        _ => format!("{} ({})", namespace, rollup),
    }
}

/// Refresh a namespace group's label and status from its children
pub fn refresh_group(tree: &mut Tree, group: NodeId) {
    let rollup = Rollup::of(tree, group);
    let Some(node) = tree.get_mut(group) else {
        return;
    };
    let NodePayload::Namespace(namespace) = &node.payload else {
        return;
    };
    node.label = group_label(namespace, node.expand_state, rollup);
    node.status = Some(if rollup.all_ready() {
        ReconcileStatus::Ready
    } else if rollup.failed == 0 {
        ReconcileStatus::Progressing
    } else {
        ReconcileStatus::Failed
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::models::Node;

    fn with_ready(status: &str, reason: Option<&str>) -> Resource {
        let mut condition = Condition::new("Ready", status);
        condition.reason = reason.map(String::from);
        Resource::new("Kustomization", "apps", Some("flux-system")).with_conditions(vec![condition])
    }

    #[test]
    fn test_ready_condition_wins_over_first() {
        let resource = Resource::new("GitRepository", "repo", Some("default")).with_conditions(vec![
            Condition::new("Reconciling", "False"),
            Condition::new("Ready", "True"),
        ]);
        assert_eq!(derive_status(&resource, StatusRule::Conditions), Some(ReconcileStatus::Ready));
    }

    #[test]
    fn test_first_condition_fallback() {
        let resource = Resource::new("Bucket", "b", Some("default"))
            .with_conditions(vec![Condition::new("Stalled", "True")]);
        assert_eq!(derive_status(&resource, StatusRule::Conditions), Some(ReconcileStatus::Ready));
    }

    #[test]
    fn test_no_conditions_is_failed() {
        let resource = Resource::new("GitRepository", "new", Some("default"));
        assert_eq!(derive_status(&resource, StatusRule::Conditions), Some(ReconcileStatus::Failed));
        assert_eq!(derive_status(&resource, StatusRule::Untracked), None);
    }

    #[test]
    fn test_progressing_only_for_workload_rule() {
        let resource = with_ready("Unknown", Some("Progressing"));
        assert_eq!(
            derive_status(&resource, StatusRule::ConditionsWithProgress),
            Some(ReconcileStatus::Progressing)
        );
        assert_eq!(derive_status(&resource, StatusRule::Conditions), Some(ReconcileStatus::Failed));

        let failed = with_ready("False", Some("BuildFailed"));
        assert_eq!(
            derive_status(&failed, StatusRule::ConditionsWithProgress),
            Some(ReconcileStatus::Failed)
        );
    }

    #[test]
    fn test_describe_suspended() {
        let resource = Resource::new("Kustomization", "apps", Some("flux-system"))
            .with_spec(serde_json::json!({"suspend": true}))
            .with_conditions(vec![Condition::new("Ready", "True").with_message("Applied revision main@sha1:abc")]);
        assert_eq!(
            describe(&resource).as_deref(),
            Some("Suspended · Applied revision main@sha1:abc")
        );
    }

    #[test]
    fn test_rollup_label() {
        let mut tree = Tree::new();
        let group = tree.insert(Node::namespace("default"));
        for (name, status) in [("a", "True"), ("b", "False"), ("c", "True")] {
            let resource = Resource::new("GitRepository", name, Some("default"))
                .with_conditions(vec![Condition::new("Ready", status)]);
            let id = tree.insert(Node::resource(name, resource));
            update_status(&mut tree, id, StatusRule::Conditions);
            tree.add_child(group, id).unwrap();
        }

        refresh_group(&mut tree, group);
        assert_eq!(tree.get(group).unwrap().label, "default (2/3)");

        tree.get_mut(group).unwrap().expand_state = ExpandState::Expanded;
        refresh_group(&mut tree, group);
        assert_eq!(tree.get(group).unwrap().label, "default");
    }

    #[test]
    fn test_group_status_prefers_progressing_over_failed() {
        let mut tree = Tree::new();
        let group = tree.insert(Node::namespace("apps"));
        let add = |tree: &mut Tree, name: &str, status: &str, reason: Option<&str>| {
            let mut resource = with_ready(status, reason);
            resource.metadata.name = name.to_string();
            let id = tree.insert(Node::resource(name, resource));
            update_status(tree, id, StatusRule::ConditionsWithProgress);
            tree.add_child(group, id).unwrap();
        };

        add(&mut tree, "infra", "True", None);
        add(&mut tree, "podinfo", "Unknown", Some("Progressing"));
        refresh_group(&mut tree, group);
        assert_eq!(tree.get(group).unwrap().status, Some(ReconcileStatus::Progressing));
        assert_eq!(tree.get(group).unwrap().label, "apps (1/2)");

        add(&mut tree, "redis", "False", Some("InstallFailed"));
        refresh_group(&mut tree, group);
        assert_eq!(tree.get(group).unwrap().status, Some(ReconcileStatus::Failed));
    }

    #[test]
    fn test_rollup_all_ready_shows_total() {
        assert_eq!(Rollup { ready: 4, failed: 0, total: 4 }.to_string(), "4");
        assert_eq!(Rollup { ready: 1, failed: 3, total: 4 }.to_string(), "1/4");
        assert_eq!(
            group_label("apps", ExpandState::Collapsed, Rollup { ready: 2, failed: 0, total: 2 }),
            "apps (2)"
        );
    }
}
