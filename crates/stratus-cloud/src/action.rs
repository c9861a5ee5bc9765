//! Plan and report types shared between the engine and the CLI

use crate::provider::Outputs;
use serde::{Deserialize, Serialize};

/// Minimal action moving applied state toward desired state for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// No prior state exists
    Create,
    /// Only mutable properties changed
    Update,
    /// An immutable property changed; tear down and re-create
    Replace,
    /// The resource left the specification
    Delete,
    /// Desired spec hash matches the last applied hash
    NoOp,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Replace => write!(f, "replace"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::NoOp => write!(f, "no-op"),
        }
    }
}

/// A planned action for a single resource node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Node id the action applies to
    pub node_id: String,

    /// Resource type tag
    pub resource_type: String,

    /// What will happen on apply
    pub kind: ActionKind,

    /// Human-readable cause (e.g. which property changed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Ordered set of planned actions for a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions in producer-before-consumer order
    pub actions: Vec<PlannedAction>,

    /// Whether any action is not a no-op
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<PlannedAction>) -> Self {
        let has_changes = actions.iter().any(|a| a.kind != ActionKind::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    pub fn actions_of_kind(&self, kind: ActionKind) -> Vec<&PlannedAction> {
        self.actions.iter().filter(|a| a.kind == kind).collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_of_kind(ActionKind::Create).len(),
            update: self.actions_of_kind(ActionKind::Update).len(),
            replace: self.actions_of_kind(ActionKind::Replace).len(),
            delete: self.actions_of_kind(ActionKind::Delete).len(),
            no_op: self.actions_of_kind(ActionKind::NoOp).len(),
        }
    }
}

/// Counts of planned actions by kind.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_op: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_op
        )
    }
}

/// Lifecycle state of a resource node during a run.
///
/// `Pending`, `Resolving` and `Applying` are transient; the rest are
/// terminal. A node only enters `Applying` once every producer is `Applied`;
/// a node with a failed producer goes straight to `Blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Resolving,
    Applying,
    Applied,
    Failed,
    Blocked,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Resolving => write!(f, "resolving"),
            NodeState::Applying => write!(f, "applying"),
            NodeState::Applied => write!(f, "applied"),
            NodeState::Failed => write!(f, "failed"),
            NodeState::Blocked => write!(f, "blocked"),
        }
    }
}

/// Final outcome of one node in an apply run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutcome {
    /// Node id
    pub node_id: String,

    /// Resource type tag
    pub resource_type: String,

    /// Final lifecycle state
    pub state: NodeState,

    /// Action that was (or would have been) taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,

    /// Resolved outputs, populated only for applied nodes
    #[serde(default, skip_serializing_if = "Outputs::is_empty")]
    pub outputs: Outputs,

    /// Originating error for failed and blocked nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeOutcome {
    pub fn applied(
        node_id: impl Into<String>,
        resource_type: impl Into<String>,
        action: ActionKind,
        outputs: Outputs,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            resource_type: resource_type.into(),
            state: NodeState::Applied,
            action: Some(action),
            outputs,
            error: None,
        }
    }

    pub fn failed(
        node_id: impl Into<String>,
        resource_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            resource_type: resource_type.into(),
            state: NodeState::Failed,
            action: None,
            outputs: Outputs::new(),
            error: Some(error.into()),
        }
    }

    pub fn blocked(
        node_id: impl Into<String>,
        resource_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            resource_type: resource_type.into(),
            state: NodeState::Blocked,
            action: None,
            outputs: Outputs::new(),
            error: Some(error.into()),
        }
    }
}

/// Result of an apply run, enumerating every node's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Outcomes in producer-before-consumer order
    pub outcomes: Vec<NodeOutcome>,

    /// Whether the run was cancelled before completion
    pub cancelled: bool,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            cancelled: false,
            duration_ms: 0,
        }
    }

    pub fn outcome(&self, node_id: &str) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| o.node_id == node_id)
    }

    /// A run is clean only if every node reached `Applied`.
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self
                .outcomes
                .iter()
                .all(|o| o.state == NodeState::Applied)
    }

    /// Some nodes applied while others failed or were blocked.
    pub fn is_partial(&self) -> bool {
        !self.is_clean()
            && self
                .outcomes
                .iter()
                .any(|o| o.state == NodeState::Applied)
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for outcome in &self.outcomes {
            match outcome.state {
                NodeState::Applied => match outcome.action {
                    Some(ActionKind::Create) => summary.created += 1,
                    Some(ActionKind::Update) => summary.updated += 1,
                    Some(ActionKind::Replace) => summary.replaced += 1,
                    Some(ActionKind::Delete) => summary.deleted += 1,
                    _ => summary.no_op += 1,
                },
                NodeState::Failed => summary.failed += 1,
                NodeState::Blocked => summary.blocked += 1,
                _ => {}
            }
        }
        summary
    }
}

impl Default for ApplyReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run counts of node outcomes.
#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub no_op: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} replaced, {} deleted, {} unchanged, {} failed, {} blocked",
            self.created,
            self.updated,
            self.replaced,
            self.deleted,
            self.no_op,
            self.failed,
            self.blocked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_detects_changes() {
        let plan = Plan::new(vec![PlannedAction {
            node_id: "vpc".into(),
            resource_type: "network".into(),
            kind: ActionKind::NoOp,
            reason: None,
        }]);
        assert!(!plan.has_changes);

        let plan = Plan::new(vec![PlannedAction {
            node_id: "vpc".into(),
            resource_type: "network".into(),
            kind: ActionKind::Create,
            reason: None,
        }]);
        assert!(plan.has_changes);
        assert_eq!(plan.summary().create, 1);
    }

    #[test]
    fn report_clean_and_partial() {
        let mut report = ApplyReport::new();
        report
            .outcomes
            .push(NodeOutcome::applied("a", "network", ActionKind::Create, Outputs::new()));
        assert!(report.is_clean());
        assert!(!report.is_partial());

        report.outcomes.push(NodeOutcome::failed("b", "subnet", "boom"));
        report
            .outcomes
            .push(NodeOutcome::blocked("c", "instance", "dependency 'b' did not apply"));
        assert!(!report.is_clean());
        assert!(report.is_partial());

        let summary = report.summary();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocked, 1);
    }
}
