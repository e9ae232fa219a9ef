//! Orchestrator (C9) — the workflow state machine and its execution loop.
//!
//! Grounded in `commands::reconcile`'s overall shape: a long-running async
//! entry owning Prometheus statics, a `Mutex`-guarded readiness flag, and
//! `tokio::select!` against `signal::ctrl_c()` — generalized here from "one
//! controller loop for one CRD" into "one task per workflow, a bounded
//! `Semaphore` for global concurrency, and an in-memory `WorkflowRegistry`".

pub mod registry;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::discovery::Discovery;
use rand::Rng;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::config::FingerprintPolicy;
use crate::circuit::CircuitState;
use crate::detector::{DeploymentDetector, DetectionInput};
use crate::domain::{
    CheckpointStatus, Fingerprint, Incident, IncidentId, Layer, Severity, StepStatus, Workflow,
    WorkflowId, WorkflowStatus,
};
use crate::error::OrchestratorError;
use crate::inference::InferenceProxy;
use crate::k8s::owner_ref::{first_custom_resource_owner, walk_owner_chain, OwnerLink};
use crate::k8s::KubeFacade;
use crate::layer::affected_layers;
use crate::metrics;
use crate::planner;
use crate::priority_lock::PriorityLock;
use crate::remediators::RemediatorRegistry;
use crate::selector;

pub use registry::{InMemoryStore, Store};

const MAX_STEP_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_STEP_DEADLINE: Duration = Duration::from_secs(120);

/// Default window for `POST /api/v1/remediation/trigger` idempotency-by-
/// `incident_id` (§6): a resubmission of the same incident inside this
/// window returns the existing workflow instead of starting a second one.
const DEFAULT_IDEMPOTENCY_WINDOW: Duration = Duration::from_secs(300);

/// Bound on the in-memory incident log `GET /api/v1/incidents` reads from,
/// oldest entries dropped first — not a persistence layer (§9 Non-goals),
/// just enough to answer the listing endpoint.
const MAX_INCIDENT_LOG: usize = 1000;

pub struct OrchestratorConfig {
    pub max_concurrent_workflows: usize,
    pub fingerprint_policy: FingerprintPolicy,
    pub idempotency_window: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: num_cpus_fallback(),
            fingerprint_policy: FingerprintPolicy::Reject,
            idempotency_window: DEFAULT_IDEMPOTENCY_WINDOW,
        }
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Held for the duration of one workflow's execution to serialize
/// submissions against the same fingerprint. `Reject` holds a tokio
/// `OwnedMutexGuard` (released on drop); `Queue` holds the severity-ordered
/// `PriorityLock` (released explicitly, see `PriorityLock::release`).
enum FingerprintGuard {
    Reject(tokio::sync::OwnedMutexGuard<()>),
    Queue(Arc<PriorityLock>),
}

/// Owns the workflow lifecycle: acceptance, per-fingerprint serialization,
/// bounded-concurrency execution, cancellation, and metrics emission.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    k8s: KubeFacade,
    detector: Arc<DeploymentDetector>,
    remediators: Arc<RemediatorRegistry>,
    inference: Option<Arc<InferenceProxy>>,
    semaphore: Arc<Semaphore>,
    config: OrchestratorConfig,
    fingerprint_locks: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
    priority_locks: Mutex<HashMap<Fingerprint, Arc<PriorityLock>>>,
    cancellations: RwLock<HashMap<WorkflowId, CancellationToken>>,
    idempotency: TtlCache<IncidentId, WorkflowId>,
    incidents: RwLock<Vec<Incident>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        k8s: KubeFacade,
        detector: Arc<DeploymentDetector>,
        remediators: Arc<RemediatorRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::with_inference(store, k8s, detector, remediators, None, config)
    }

    /// Same as `new`, plus an inference proxy whose circuit state feeds the
    /// health-score component of strategy selection (§4.7, §8 scenario 6):
    /// an open circuit degrades every candidate's health score to 0 rather
    /// than silently keeping the optimistic default.
    pub fn with_inference(
        store: Arc<dyn Store>,
        k8s: KubeFacade,
        detector: Arc<DeploymentDetector>,
        remediators: Arc<RemediatorRegistry>,
        inference: Option<Arc<InferenceProxy>>,
        config: OrchestratorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_workflows));
        let idempotency = TtlCache::new(config.idempotency_window);
        Self {
            store,
            k8s,
            detector,
            remediators,
            inference,
            semaphore,
            config,
            fingerprint_locks: Mutex::new(HashMap::new()),
            priority_locks: Mutex::new(HashMap::new()),
            cancellations: RwLock::new(HashMap::new()),
            idempotency,
            incidents: RwLock::new(Vec::new()),
        }
    }

    /// Health-score input per registered remediator for this planning
    /// round. Uniform today (the only live health signal is the inference
    /// circuit, which isn't per-remediator) but kept as a map so a future
    /// per-remediator health source only needs to populate it further.
    async fn remediator_health_scores(&self) -> HashMap<String, f64> {
        let inference_healthy = match &self.inference {
            Some(proxy) => proxy.breaker_state().await != CircuitState::Open,
            None => true,
        };
        let score = if inference_healthy { 1.0 } else { 0.0 };
        let gauge_value = if inference_healthy { 1 } else { 0 };
        self.remediators
            .all()
            .iter()
            .map(|r| {
                metrics::REMEDIATOR_HEALTH.with_label_values(&[r.name()]).set(gauge_value);
                (r.name().to_string(), score)
            })
            .collect()
    }

    async fn fingerprint_lock(&self, fingerprint: &Fingerprint) -> Arc<Mutex<()>> {
        let mut locks = self.fingerprint_locks.lock().await;
        locks
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn priority_lock(&self, fingerprint: &Fingerprint) -> Arc<PriorityLock> {
        let mut locks = self.priority_locks.lock().await;
        locks
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(PriorityLock::new()))
            .clone()
    }

    /// Accept an incident submission, enforcing the configured
    /// per-fingerprint serialization policy (§3 invariants, §9 Open
    /// Questions — default `Reject`).
    pub async fn submit(self: &Arc<Self>, incident: Incident) -> Result<WorkflowId, OrchestratorError> {
        if let Some(existing) = self.idempotency.get(&incident.id).await {
            return Ok(existing);
        }

        {
            let mut log = self.incidents.write().await;
            log.push(incident.clone());
            if log.len() > MAX_INCIDENT_LOG {
                let overflow = log.len() - MAX_INCIDENT_LOG;
                log.drain(0..overflow);
            }
        }

        let fingerprint = incident.fingerprint();

        let fingerprint_guard = match self.config.fingerprint_policy {
            FingerprintPolicy::Reject => {
                let lock = self.fingerprint_lock(&fingerprint).await;
                let owned = lock.clone().try_lock_owned().map_err(|_| {
                    OrchestratorError::Conflict(format!(
                        "a workflow is already active for {}/{}/{}",
                        fingerprint.namespace, fingerprint.kind, fingerprint.name
                    ))
                })?;
                FingerprintGuard::Reject(owned)
            }
            FingerprintPolicy::Queue => {
                let plock = self.priority_lock(&fingerprint).await;
                plock.acquire(&incident.issue.severity).await;
                FingerprintGuard::Queue(plock)
            }
        };

        let workflow = Workflow {
            id: uuid::Uuid::new_v4(),
            incident_id: incident.id,
            status: WorkflowStatus::Pending,
            deployment_method: crate::domain::DeploymentMethod::Unknown,
            affected_layers: vec![],
            steps: vec![],
            checkpoints: vec![],
            started_at: None,
            completed_at: None,
            error: None,
        };
        let workflow_id = workflow.id;
        self.store.save(workflow).await?;
        self.idempotency.put(incident.id, workflow_id).await;

        let token = CancellationToken::new();
        self.cancellations.write().await.insert(workflow_id, token.clone());

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_workflow(workflow_id, incident, token).await;
            // Release after the workflow settles, serializing subsequent
            // submissions on the same fingerprint. `Reject`'s tokio `Mutex`
            // releases on drop; `Queue`'s `PriorityLock` needs an explicit
            // release so it can wake its highest-severity waiter.
            match fingerprint_guard {
                FingerprintGuard::Reject(_owned) => {}
                FingerprintGuard::Queue(plock) => plock.release().await,
            }
        });

        Ok(workflow_id)
    }

    /// Request cancellation; the workflow transitions to `cancelled` once
    /// the in-flight step settles (§5).
    pub async fn cancel(&self, workflow_id: WorkflowId) -> Result<(), OrchestratorError> {
        let tokens = self.cancellations.read().await;
        let token = tokens
            .get(&workflow_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("workflow {workflow_id} not found")))?;
        token.cancel();
        Ok(())
    }

    pub async fn get(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, OrchestratorError> {
        self.store.get(workflow_id).await
    }

    pub async fn list(&self) -> Result<Vec<Workflow>, OrchestratorError> {
        self.store.list().await
    }

    /// `GET /api/v1/incidents?namespace&severity&limit` (§6): most-recent
    /// first, filtered on whichever of `namespace`/`severity` are given.
    pub async fn list_incidents(
        &self,
        namespace: Option<&str>,
        severity: Option<Severity>,
        limit: Option<usize>,
    ) -> Vec<Incident> {
        let log = self.incidents.read().await;
        let mut matching: Vec<Incident> = log
            .iter()
            .rev()
            .filter(|i| match namespace {
                Some(ns) => i.namespace == ns,
                None => true,
            })
            .filter(|i| match &severity {
                Some(s) => &i.issue.severity == s,
                None => true,
            })
            .cloned()
            .collect();
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        matching
    }

    async fn run_workflow(self: Arc<Self>, workflow_id: WorkflowId, incident: Incident, token: CancellationToken) {
        let _permit = self.semaphore.acquire().await.expect("semaphore not closed");

        if let Err(e) = self.execute(workflow_id, &incident, &token).await {
            warn!(workflow = %workflow_id, error = %e, "workflow_execution_error");
            if let Ok(Some(mut workflow)) = self.store.get(workflow_id).await {
                workflow.status = WorkflowStatus::Failed;
                workflow.error = Some(e.to_string());
                workflow.completed_at = Some(Utc::now());
                let _ = self.store.save(workflow).await;
            }
        }

        self.cancellations.write().await.remove(&workflow_id);
    }

    async fn execute(
        &self,
        workflow_id: WorkflowId,
        incident: &Incident,
        token: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let mut workflow = self
            .store
            .get(workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("workflow {workflow_id} not found")))?;

        workflow.status = WorkflowStatus::InProgress;
        workflow.started_at = Some(Utc::now());
        self.store.save(workflow.clone()).await?;

        let info = self.detect_deployment_info(incident).await?;
        let layers = affected_layers(incident);

        let health_scores = self.remediator_health_scores().await;
        let chosen = selector::select_from_registry(&info, self.remediators.all(), &health_scores, &HashMap::new());
        metrics::STRATEGY_SELECTION_TOTAL
            .with_label_values(&[chosen.as_deref().unwrap_or(selector::MANUAL_FALLBACK_NAME)])
            .inc();

        let (steps, checkpoints) = planner::plan(incident, &info, layers, move |_| chosen.clone());

        workflow.deployment_method = info.method.clone();
        workflow.affected_layers = workflow_layers(&steps);
        workflow.steps = steps;
        workflow.checkpoints = checkpoints;
        self.store.save(workflow.clone()).await?;

        metrics::ACTIVE_WORKFLOWS
            .with_label_values(&[deployment_method_label(&info.method)])
            .inc();

        let outcome = self.run_steps(&mut workflow, incident, &info, token).await;

        metrics::ACTIVE_WORKFLOWS
            .with_label_values(&[deployment_method_label(&info.method)])
            .dec();

        self.detector
            .invalidate(&info.namespace, &info.kind, &info.name)
            .await;

        outcome
    }

    async fn run_steps(
        &self,
        workflow: &mut Workflow,
        incident: &Incident,
        info: &crate::domain::DeploymentInfo,
        token: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let timer = metrics::REMEDIATION_DURATION_SECONDS.start_timer();
        let method_label = deployment_method_label(&info.method);

        for step_index in 0..workflow.steps.len() {
            if token.is_cancelled() {
                workflow.status = WorkflowStatus::Cancelled;
                workflow.completed_at = Some(Utc::now());
                self.store.save(workflow.clone()).await?;
                return Ok(());
            }

            workflow.steps[step_index].status = StepStatus::Running;
            workflow.steps[step_index].started_at = Some(Utc::now());
            self.store.save(workflow.clone()).await?;

            let remediator_name = workflow.steps[step_index].remediator_name.clone();
            let result = self
                .run_step_with_retries(incident, info, &workflow.steps[step_index].clone(), &remediator_name, token)
                .await;

            let step = &mut workflow.steps[step_index];
            step.completed_at = Some(Utc::now());

            match result {
                Ok(()) => {
                    step.status = StepStatus::Completed;
                    metrics::STEP_TOTAL.with_label_values(&[remediator_name.as_str(), "completed"]).inc();
                }
                Err(OrchestratorError::Cancelled) => {
                    step.status = StepStatus::Failed;
                    step.error = Some("cancelled".to_string());
                    metrics::STEP_TOTAL.with_label_values(&[remediator_name.as_str(), "cancelled"]).inc();
                    self.store.save(workflow.clone()).await?;

                    workflow.status = WorkflowStatus::Cancelled;
                    workflow.completed_at = Some(Utc::now());
                    self.store.save(workflow.clone()).await?;

                    drop(timer);
                    return Ok(());
                }
                Err(e) => {
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());
                    metrics::STEP_TOTAL.with_label_values(&[remediator_name.as_str(), "failed"]).inc();
                    self.store.save(workflow.clone()).await?;

                    workflow.status = WorkflowStatus::Failed;
                    workflow.error = Some(e.to_string());
                    workflow.completed_at = Some(Utc::now());
                    self.store.save(workflow.clone()).await?;

                    metrics::REMEDIATION_FAILURE_TOTAL
                        .with_label_values(&[method_label, incident.issue.issue_type.as_str(), e.error_code()])
                        .inc();
                    drop(timer);
                    return Err(e);
                }
            }
            self.store.save(workflow.clone()).await?;

            if let Some(checkpoint_layer) = workflow
                .checkpoints
                .iter()
                .find(|c| c.after_step == step_index as u32)
                .map(|c| c.layer)
            {
                let observed_status = self
                    .evaluate_checkpoint_health(&incident.namespace, info, checkpoint_layer)
                    .await;
                let failed_non_advisory = {
                    let checkpoint = workflow
                        .checkpoints
                        .iter_mut()
                        .find(|c| c.after_step == step_index as u32)
                        .expect("checkpoint located just above");
                    checkpoint.status = observed_status;
                    checkpoint.observed_at = Utc::now();
                    checkpoint.status == CheckpointStatus::Failed && !checkpoint.advisory
                };
                self.store.save(workflow.clone()).await?;

                if failed_non_advisory {
                    workflow.status = WorkflowStatus::Failed;
                    workflow.error = Some("non-advisory checkpoint failed".to_string());
                    workflow.completed_at = Some(Utc::now());
                    self.store.save(workflow.clone()).await?;
                    drop(timer);
                    return Err(OrchestratorError::Validation("checkpoint_failed".to_string()));
                }
            }
        }

        workflow.status = WorkflowStatus::Completed;
        workflow.completed_at = Some(Utc::now());
        self.store.save(workflow.clone()).await?;

        metrics::REMEDIATION_TOTAL
            .with_label_values(&[method_label, incident.issue.issue_type.as_str()])
            .inc();
        metrics::REMEDIATION_SUCCESS_TOTAL
            .with_label_values(&[method_label, incident.issue.issue_type.as_str()])
            .inc();
        drop(timer);
        Ok(())
    }

    async fn run_step_with_retries(
        &self,
        incident: &Incident,
        info: &crate::domain::DeploymentInfo,
        step: &crate::domain::Step,
        remediator_name: &str,
        token: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let Some(remediator) = self.remediators.by_name(remediator_name) else {
            return Err(OrchestratorError::NoRemediator(format!(
                "no remediator registered with name '{remediator_name}'"
            )));
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let step_timer = metrics::STEP_DURATION_SECONDS.start_timer();

            let deadline = (remediator.estimated_duration() * 2).min(MAX_STEP_DEADLINE);
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(OrchestratorError::Cancelled),
                r = tokio::time::timeout(deadline, remediator.execute(incident, info, step)) => {
                    match r {
                        Ok(inner) => inner,
                        Err(_) => Err(OrchestratorError::Timeout(format!(
                            "remediator '{remediator_name}' exceeded {deadline:?}"
                        ))),
                    }
                }
            };
            drop(step_timer);

            let result = match outcome {
                Ok(outcome) if outcome.ok => {
                    for emitted_event in &outcome.emitted_events {
                        info!(remediator = remediator_name, emitted_event, "remediation_event");
                    }
                    Ok(())
                }
                Ok(outcome) if outcome.retry_advice => {
                    Err(OrchestratorError::BackendUnavailable(outcome.observed_state))
                }
                Ok(outcome) => Err(OrchestratorError::Validation(outcome.observed_state)),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.retryable() && attempt < MAX_STEP_ATTEMPTS => {
                    let backoff = backoff_with_jitter(attempt);
                    info!(remediator = remediator_name, attempt, ?backoff, "retrying_step");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve `DeploymentInfo` for an incident by fetching the resource's
    /// metadata and walking its owner chain against the live cluster —
    /// the async counterpart to `detector::classify`'s pure, closure-based
    /// walk, since discovery and `get` calls are unavoidably async here.
    async fn detect_deployment_info(
        &self,
        incident: &Incident,
    ) -> Result<crate::domain::DeploymentInfo, OrchestratorError> {
        let discovery = Discovery::new(self.k8s.client().clone())
            .run()
            .await
            .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?;

        let resource = discovery
            .groups()
            .flat_map(|g| g.resources_by_stability())
            .find(|(ar, _)| ar.kind == incident.resource.kind)
            .map(|(ar, _)| ar)
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!(
                    "no API resource registered for kind '{}'",
                    incident.resource.kind
                ))
            })?;

        let object = self
            .k8s
            .get_dynamic(&resource, Some(&incident.namespace), &incident.resource.name)
            .await?;

        let owners: Vec<OwnerReference> = object.metadata.owner_references.clone().unwrap_or_default();
        let chain = self.resolve_owner_chain_async(&incident.namespace, owners).await;

        let input = DetectionInput {
            namespace: &incident.namespace,
            name: &incident.resource.name,
            kind: &incident.resource.kind,
            metadata: &object.metadata,
            owner_chain: &chain,
        };

        Ok(self.detector.detect(&input).await)
    }

    async fn resolve_owner_chain_async(&self, namespace: &str, start_owners: Vec<OwnerReference>) -> Vec<OwnerLink> {
        // Bounded/cycle-safe walk mirroring `owner_ref::walk_owner_chain`,
        // but resolved against the live cluster one hop at a time since
        // each lookup is an async API call.
        let discovery = match Discovery::new(self.k8s.client().clone()).run().await {
            Ok(d) => d,
            Err(_) => return walk_owner_chain(&start_owners, |_, _| None),
        };

        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut chain = Vec::new();
        let mut frontier = start_owners;

        for _ in 0..crate::k8s::owner_ref::MAX_WALK_DEPTH {
            let Some(owner) = frontier.first().cloned() else {
                break;
            };
            let key = (owner.kind.clone(), owner.name.clone());
            if !visited.insert(key) {
                break;
            }
            chain.push(OwnerLink {
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            });

            if first_custom_resource_owner(std::slice::from_ref(chain.last().unwrap())).is_some() {
                break;
            }

            let Some((ar, _)) = discovery.groups().flat_map(|g| g.resources_by_stability()).find(|(ar, _)| ar.kind == owner.kind) else {
                break;
            };

            match self.k8s.get_dynamic(&ar, Some(namespace), &owner.name).await {
                Ok(obj) => match obj.metadata.owner_references {
                    Some(next) if !next.is_empty() => frontier = next,
                    _ => break,
                },
                Err(_) => break,
            }
        }

        chain
    }

    /// Post-step health gate for the checkpoint inserted after `layer`
    /// (§4.9 "post-step health checks"). Only the application layer has a
    /// live signal wired in this build — pod readiness for the incident's
    /// own resource, via the same `list_pods` the manual-k8s remediator
    /// uses — so infrastructure/platform checkpoints stay `Passed` and are
    /// planted `advisory` by the planner rather than silently treated as
    /// validated. A query failure degrades to `Passed` rather than failing
    /// the workflow on a backend hiccup (§7 "degrades to a documented
    /// baseline").
    async fn evaluate_checkpoint_health(
        &self,
        namespace: &str,
        info: &crate::domain::DeploymentInfo,
        layer: Layer,
    ) -> CheckpointStatus {
        if layer != Layer::Application {
            return CheckpointStatus::Passed;
        }

        let owner_prefix = format!("{}-", info.name);
        match self.k8s.list_pods(namespace).await {
            Ok(pods) => {
                let owned: Vec<&Pod> = pods
                    .iter()
                    .filter(|p| {
                        p.metadata
                            .name
                            .as_deref()
                            .map(|n| n.starts_with(owner_prefix.as_str()))
                            .unwrap_or(false)
                    })
                    .collect();
                if owned.is_empty() || owned.iter().all(|p| pod_is_ready(p)) {
                    CheckpointStatus::Passed
                } else {
                    CheckpointStatus::Failed
                }
            }
            Err(e) => {
                warn!(error = %e, "checkpoint_health_check_degraded");
                CheckpointStatus::Passed
            }
        }
    }
}

/// `status.conditions[].{type: Ready, status: "True"}`, the same signal
/// `kubectl get pods` reports as READY.
fn pod_is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

fn workflow_layers(steps: &[crate::domain::Step]) -> Vec<crate::domain::Layer> {
    let mut layers: Vec<crate::domain::Layer> = steps.iter().map(|s| s.layer).collect();
    layers.dedup();
    layers
}

fn deployment_method_label(method: &crate::domain::DeploymentMethod) -> &'static str {
    use crate::domain::DeploymentMethod::*;
    match method {
        Gitops => "gitops",
        Helm => "helm",
        Operator => "operator",
        Manual => "manual",
        Unknown => "unknown",
    }
}

fn backoff_with_jitter(attempt: u32) -> Duration {
    let exp = BASE_BACKOFF.as_millis() as u64 * 2u64.pow(attempt.saturating_sub(1));
    let jitter = rand::thread_rng().gen_range(0..=exp / 4 + 1);
    Duration::from_millis(exp + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_with_attempt() {
        let b1 = backoff_with_jitter(1).as_millis();
        let b2 = backoff_with_jitter(2).as_millis();
        // jitter makes exact comparison flaky; assert the base scaling holds.
        assert!(b1 >= BASE_BACKOFF.as_millis());
        assert!(b2 >= BASE_BACKOFF.as_millis() * 2);
    }

    #[test]
    fn deployment_method_labels_are_lowercase_stable_strings() {
        assert_eq!(deployment_method_label(&crate::domain::DeploymentMethod::Gitops), "gitops");
        assert_eq!(deployment_method_label(&crate::domain::DeploymentMethod::Manual), "manual");
    }

    #[test]
    fn pod_is_ready_reads_the_ready_condition() {
        use k8s_openapi::api::core::v1::{PodCondition, PodStatus};

        let ready = Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(pod_is_ready(&ready));

        let not_ready = Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!pod_is_ready(&not_ready));

        assert!(!pod_is_ready(&Pod::default()));
    }
}
