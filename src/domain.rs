//! Core data model: incidents, deployment info, workflows, steps, checkpoints.
//!
//! Mirrors the shapes in SPEC_FULL.md §3. Everything here is plain data —
//! no I/O, no async — so it can be constructed and asserted on in unit
//! tests without a cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* ============================= IDS ============================= */

pub type IncidentId = Uuid;
pub type WorkflowId = Uuid;

/* ============================= INCIDENT ============================= */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Higher rank preempts lower rank when incidents queue on the same
    /// fingerprint (see SPEC_FULL.md §3 supplement).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub description: String,
    pub severity: Severity,
}

/// A namespace-scoped incident report. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub namespace: String,
    pub resource: ResourceRef,
    pub issue: Issue,
    pub created_at: DateTime<Utc>,
}

impl Incident {
    /// Identity used for per-fingerprint workflow serialization: the
    /// `(namespace, kind, name)` triple, same grain as the deployment-info
    /// cache key.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            namespace: self.namespace.clone(),
            kind: self.resource.kind.clone(),
            name: self.resource.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

/* ============================= DEPLOYMENT INFO ============================= */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMethod {
    Gitops,
    Helm,
    Operator,
    Manual,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub method: DeploymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

/* ============================= LAYER ============================= */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Infrastructure,
    Platform,
    Application,
}

impl Layer {
    /// Ordinal used to sort steps infra → platform → app (§4.8).
    pub fn order(&self) -> u8 {
        match self {
            Layer::Infrastructure => 0,
            Layer::Platform => 1,
            Layer::Application => 2,
        }
    }
}

/* ============================= STEP ============================= */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Step transitions are forward-only: pending -> running ->
    /// (completed|failed|skipped). No backward transitions (§3 invariants).
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Skipped)
                | (Pending, Skipped)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub order: u32,
    pub layer: Layer,
    pub description: String,
    pub remediator_name: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    pub fn new(order: u32, layer: Layer, description: impl Into<String>, remediator_name: impl Into<String>) -> Self {
        Self {
            order,
            layer,
            description: description.into(),
            remediator_name: remediator_name.into(),
            status: StepStatus::Pending,
            attempts: 0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/* ============================= CHECKPOINT ============================= */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub layer: Layer,
    pub after_step: u32,
    pub status: CheckpointStatus,
    pub checks: Vec<String>,
    pub observed_at: DateTime<Utc>,
    /// Advisory checkpoints never fail the workflow even when status=failed
    /// (§3 invariants).
    pub advisory: bool,
}

/* ============================= WORKFLOW ============================= */

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// A workflow is terminal iff status ∈ {completed, failed, cancelled};
    /// terminal workflows are immutable (§3 invariants).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub incident_id: IncidentId,
    pub status: WorkflowStatus,
    pub deployment_method: DeploymentMethod,
    pub affected_layers: Vec<Layer>,
    pub steps: Vec<Step>,
    pub checkpoints: Vec<Checkpoint>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Workflow {
    /// Step orders must be `0..len-1`, strictly ascending, no gaps (§8).
    pub fn steps_are_well_ordered(&self) -> bool {
        self.steps
            .iter()
            .enumerate()
            .all(|(i, s)| s.order == i as u32)
    }
}

/* ============================= TESTS ============================= */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_completed_failed_cancelled() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::InProgress.is_terminal());
    }

    #[test]
    fn step_status_forbids_backward_transitions() {
        assert!(StepStatus::Pending.can_transition_to(StepStatus::Running));
        assert!(StepStatus::Running.can_transition_to(StepStatus::Completed));
        assert!(!StepStatus::Completed.can_transition_to(StepStatus::Running));
        assert!(!StepStatus::Failed.can_transition_to(StepStatus::Pending));
        assert!(!StepStatus::Running.can_transition_to(StepStatus::Pending));
    }

    #[test]
    fn severity_rank_is_monotonic() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Medium.rank() > Severity::Low.rank());
    }

    #[test]
    fn layer_order_is_infra_platform_app() {
        assert!(Layer::Infrastructure.order() < Layer::Platform.order());
        assert!(Layer::Platform.order() < Layer::Application.order());
    }

    #[test]
    fn steps_well_ordered_detects_gaps() {
        let mut w = Workflow {
            id: Uuid::new_v4(),
            incident_id: Uuid::new_v4(),
            status: WorkflowStatus::Pending,
            deployment_method: DeploymentMethod::Manual,
            affected_layers: vec![Layer::Application],
            steps: vec![
                Step::new(0, Layer::Application, "a", "manual-k8s"),
                Step::new(1, Layer::Application, "b", "manual-k8s"),
            ],
            checkpoints: vec![],
            started_at: None,
            completed_at: None,
            error: None,
        };
        assert!(w.steps_are_well_ordered());

        w.steps[1].order = 2;
        assert!(!w.steps_are_well_ordered());
    }
}
