mod common;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use common::{make_deployment_info, make_incident, object_meta, owner_ref};
use remediation_orchestrator::circuit::{CircuitBreaker, CircuitState};
use remediation_orchestrator::detector::{self, DetectionInput, GITOPS_ANNOTATION, HELM_ANNOTATION};
use remediation_orchestrator::domain::{
    CheckpointStatus, DeploymentMethod, Layer, Severity, Step, StepStatus, Workflow, WorkflowStatus,
};
use remediation_orchestrator::error::OrchestratorError;
use remediation_orchestrator::k8s::owner_ref::walk_owner_chain;
use remediation_orchestrator::layer;
use remediation_orchestrator::planner;
use remediation_orchestrator::remediators::helm::{HelmController, HelmRollbackRemediator};
use remediation_orchestrator::remediators::{RemediationOutcome, Remediator};
use remediation_orchestrator::selector;

// ══════════════════════════════════════════════════════════════════
// The six end-to-end scenarios, approximated without a live cluster:
// detection -> layering -> selection -> planning, plus the remediator
// and circuit-breaker seams each scenario depends on.
// ══════════════════════════════════════════════════════════════════

struct StubRemediator {
    remediator_name: &'static str,
    applies: DeploymentMethod,
    duration_secs: u64,
}

#[async_trait]
impl Remediator for StubRemediator {
    fn name(&self) -> &'static str {
        self.remediator_name
    }

    fn applies_to(&self, info: &remediation_orchestrator::domain::DeploymentInfo) -> bool {
        info.method == self.applies || self.remediator_name == "manual-k8s"
    }

    fn estimated_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.duration_secs)
    }

    async fn execute(
        &self,
        _incident: &remediation_orchestrator::domain::Incident,
        _info: &remediation_orchestrator::domain::DeploymentInfo,
        _step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError> {
        Ok(RemediationOutcome::success("stub remediation applied"))
    }
}

fn standard_registry() -> Vec<Box<dyn Remediator>> {
    vec![
        Box::new(StubRemediator { remediator_name: "gitops-sync", applies: DeploymentMethod::Gitops, duration_secs: 60 }),
        Box::new(StubRemediator { remediator_name: "helm-rollback", applies: DeploymentMethod::Helm, duration_secs: 45 }),
        Box::new(StubRemediator { remediator_name: "operator-reconcile", applies: DeploymentMethod::Operator, duration_secs: 30 }),
        Box::new(StubRemediator { remediator_name: "manual-k8s", applies: DeploymentMethod::Manual, duration_secs: 20 }),
    ]
}

/// Scenario 1: a gitops-tracked app crash-loops. Detection must land on
/// `gitops` at 0.95, and the plan must pick the gitops-native remediator.
#[test]
fn scenario_one_gitops_crash_loop_plans_a_gitops_sync() {
    let metadata = object_meta(&[(GITOPS_ANNOTATION, "argocd/payment-service")], &[]);
    let input = DetectionInput {
        namespace: "production",
        name: "payment-service",
        kind: "Deployment",
        metadata: &metadata,
        owner_chain: &[],
    };
    let (method, confidence, _, _) = detector::classify(&input);
    assert_eq!(method, DeploymentMethod::Gitops);
    assert_eq!(confidence, 0.95);

    let incident = make_incident("production", "Deployment", "payment-service", "crash_loop", Severity::High);
    let info = make_deployment_info("production", "payment-service", "Deployment", method, confidence);
    let registry = standard_registry();
    let layers = layer::affected_layers(&incident);
    let (steps, checkpoints) = planner::plan(&incident, &info, layers, |info| {
        selector::select_from_registry(info, &registry, &HashMap::new(), &HashMap::new())
    });

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].remediator_name, "gitops-sync");
    assert_eq!(checkpoints.len(), 1);
}

/// Scenario 2: a helm release ships a bad config. Detection lands on
/// `helm` at 0.90; the rollback remediator, backed by a controller that
/// always fails, reports a retryable outcome rather than succeeding.
#[tokio::test]
async fn scenario_two_helm_bad_config_plans_a_rollback_and_surfaces_a_retryable_failure() {
    let metadata = object_meta(&[(HELM_ANNOTATION, "checkout")], &[]);
    let input = DetectionInput {
        namespace: "production",
        name: "checkout",
        kind: "Deployment",
        metadata: &metadata,
        owner_chain: &[],
    };
    let (method, confidence, managed_by, _) = detector::classify(&input);
    assert_eq!(method, DeploymentMethod::Helm);
    assert_eq!(confidence, 0.90);
    assert_eq!(managed_by.as_deref(), Some("checkout"));

    struct AlwaysDown;
    #[async_trait]
    impl HelmController for AlwaysDown {
        async fn rollback(&self, _namespace: &str, _release: &str) -> Result<u32, OrchestratorError> {
            Err(OrchestratorError::BackendUnavailable("tiller unreachable".into()))
        }
    }

    let remediator = HelmRollbackRemediator::new(std::sync::Arc::new(AlwaysDown));
    let incident = make_incident("production", "Deployment", "checkout", "bad_config", Severity::Medium);
    let info = make_deployment_info("production", "checkout", "Deployment", method, confidence);
    let step = Step::new(0, Layer::Application, "roll back checkout", "helm-rollback");

    let err = remediator.execute(&incident, &info, &step).await.unwrap_err();
    assert!(err.retryable());
    assert_eq!(err.status_code(), 503);
}

/// Scenario 3: a pod owned by a custom resource (no gitops/helm/operator
/// label) is detected as operator-managed via the owner chain, at the
/// fixed 0.75 confidence, and its plan targets the operator remediator.
#[test]
fn scenario_three_operator_owned_custom_resource_plans_a_reconcile() {
    let chain = walk_owner_chain(&[owner_ref("ReplicaSet", "customers-abcde")], |kind, _name| match kind {
        "ReplicaSet" => Some(vec![owner_ref("Deployment", "customers")]),
        "Deployment" => Some(vec![owner_ref("Database", "customers")]),
        _ => None,
    });
    let metadata = object_meta(&[], &[]);
    let input = DetectionInput {
        namespace: "data",
        name: "customers-abcde-xyz",
        kind: "Pod",
        metadata: &metadata,
        owner_chain: &chain,
    };
    let (method, confidence, managed_by, _) = detector::classify(&input);
    assert_eq!(method, DeploymentMethod::Operator);
    assert_eq!(confidence, 0.75);
    assert_eq!(managed_by.as_deref(), Some("Database/customers"));

    let incident = make_incident("data", "Pod", "customers-abcde-xyz", "crash_loop", Severity::High);
    let info = make_deployment_info("data", "customers-abcde-xyz", "Pod", method, confidence);
    let registry = standard_registry();
    let layers = layer::affected_layers(&incident);
    let (steps, _) = planner::plan(&incident, &info, layers, |info| {
        selector::select_from_registry(info, &registry, &HashMap::new(), &HashMap::new())
    });
    assert_eq!(steps[0].remediator_name, "operator-reconcile");
}

/// Scenario 4: a workload with no recognizable label, annotation, or
/// custom-resource owner falls all the way through the ladder to the
/// manual remediator at 0.60.
#[test]
fn scenario_four_unrecognized_workload_falls_back_to_manual() {
    let metadata = object_meta(&[], &[]);
    let input = DetectionInput {
        namespace: "default",
        name: "scratch-job",
        kind: "Deployment",
        metadata: &metadata,
        owner_chain: &[],
    };
    let (method, confidence, managed_by, source) = detector::classify(&input);
    assert_eq!(method, DeploymentMethod::Manual);
    assert_eq!(confidence, 0.60);
    assert!(managed_by.is_none());
    assert!(source.is_none());

    let incident = make_incident("default", "Deployment", "scratch-job", "pod_crash_loop", Severity::Medium);
    let info = make_deployment_info("default", "scratch-job", "Deployment", method, confidence);
    let registry = standard_registry();
    let layers = layer::affected_layers(&incident);
    let (steps, _) = planner::plan(&incident, &info, layers, |info| {
        selector::select_from_registry(info, &registry, &HashMap::new(), &HashMap::new())
    });
    assert_eq!(steps[0].remediator_name, "manual-k8s");
}

/// Scenario 5: a workflow cancelled mid-step leaves its completed step
/// untouched, never dispatches the next one, and settles in a terminal,
/// immutable state.
#[test]
fn scenario_five_cancellation_mid_step_freezes_the_workflow_in_a_terminal_state() {
    let mut workflow = Workflow {
        id: uuid::Uuid::new_v4(),
        incident_id: uuid::Uuid::new_v4(),
        status: WorkflowStatus::InProgress,
        deployment_method: DeploymentMethod::Manual,
        affected_layers: vec![Layer::Application],
        steps: vec![
            Step::new(0, Layer::Application, "delete crash pod", "manual-k8s"),
            Step::new(1, Layer::Application, "restart deployment", "manual-k8s"),
        ],
        checkpoints: vec![],
        started_at: Some(Utc::now()),
        completed_at: None,
        error: None,
    };

    // step 0 ran to completion before cancellation arrived.
    assert!(StepStatus::Pending.can_transition_to(StepStatus::Running));
    workflow.steps[0].status = StepStatus::Running;
    assert!(StepStatus::Running.can_transition_to(StepStatus::Completed));
    workflow.steps[0].status = StepStatus::Completed;
    workflow.steps[0].completed_at = Some(Utc::now());

    // cancellation lands before step 1 is ever dispatched.
    workflow.status = WorkflowStatus::Cancelled;
    workflow.completed_at = Some(Utc::now());

    assert_eq!(workflow.steps[1].status, StepStatus::Pending);
    assert!(workflow.status.is_terminal());
    assert!(workflow.steps_are_well_ordered());
}

/// Scenario 6: the inference backend's circuit is open. Selection still
/// produces a remediator — the health-score component degrades to 0 but
/// the confidence/success-rate components still let a correctly-matched
/// candidate win over the fallback.
#[tokio::test]
async fn scenario_six_open_inference_circuit_still_yields_a_plan() {
    let breaker = CircuitBreaker::new(1, std::time::Duration::from_secs(60));
    breaker.record_failure().await;
    assert_eq!(breaker.state().await, CircuitState::Open);

    let inference_healthy = breaker.allow().await;
    assert!(!inference_healthy);

    let mut health_scores = HashMap::new();
    for name in ["gitops-sync", "helm-rollback", "operator-reconcile", "manual-k8s"] {
        health_scores.insert(name.to_string(), 0.0);
    }

    let incident = make_incident("production", "Deployment", "payment-service", "crash_loop", Severity::High);
    let info = make_deployment_info("production", "payment-service", "Deployment", DeploymentMethod::Gitops, 0.95);
    let registry = standard_registry();
    let layers = layer::affected_layers(&incident);
    let (steps, checkpoints) = planner::plan(&incident, &info, layers, |info| {
        selector::select_from_registry(info, &registry, &health_scores, &HashMap::new())
    });

    // a plan is still produced even though every health score is zeroed.
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].remediator_name, "gitops-sync");
    assert_eq!(checkpoints[0].status, CheckpointStatus::Passed);
}
