//! Manual/unknown-deployment remediation: the always-available fallback.
//! Generalizes `enforcement::build_container_patches`/`apply_remediation`'s
//! per-kind dispatch into four plain actions keyed off the incident's
//! issue type, rather than one fixed probe/resource injection.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};

use crate::domain::{DeploymentInfo, Incident, Step};
use crate::error::OrchestratorError;
use crate::k8s::KubeFacade;

use super::{RemediationOutcome, Remediator};

const RESTART_ANNOTATION: &str = "remediation-orchestrator.io/restarted-at";

pub struct ManualK8sRemediator {
    k8s: KubeFacade,
}

impl ManualK8sRemediator {
    pub fn new(k8s: KubeFacade) -> Self {
        Self { k8s }
    }

    /// Delete all pods owned by the resource so the controller recreates
    /// them fresh — used for crash-loop-style issues on bare workloads.
    async fn delete_pods(&self, info: &DeploymentInfo) -> Result<u32, OrchestratorError> {
        let pods = self.k8s.list_pods(&info.namespace).await?;
        let mut deleted = 0;
        for pod in pods {
            let Some(name) = pod.metadata.name.as_deref() else {
                continue;
            };
            if !name.starts_with(&format!("{}-", info.name)) {
                continue;
            }
            self.k8s.delete_pod(&info.namespace, name).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Rolling-restart via pod-template annotation bump, the same
    /// `Patch::Strategic` shape `enforcement::apply_remediation` uses.
    async fn restart_workload(&self, info: &DeploymentInfo) -> Result<(), OrchestratorError> {
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            RESTART_ANNOTATION: chrono::Utc::now().to_rfc3339()
                        }
                    }
                }
            }
        });
        let params = PatchParams::apply("remediation-orchestrator");

        match info.kind.as_str() {
            "Deployment" => {
                let api = self.k8s.deployments(&info.namespace);
                api.patch(&info.name, &params, &Patch::Strategic(&patch))
                    .await
                    .map_err(OrchestratorError::from)?;
            }
            "StatefulSet" => {
                let api = self.k8s.stateful_sets(&info.namespace);
                api.patch(&info.name, &params, &Patch::Strategic(&patch))
                    .await
                    .map_err(OrchestratorError::from)?;
            }
            "DaemonSet" => {
                let api = self.k8s.daemon_sets(&info.namespace);
                api.patch(&info.name, &params, &Patch::Strategic(&patch))
                    .await
                    .map_err(OrchestratorError::from)?;
            }
            other => {
                return Err(OrchestratorError::Validation(format!(
                    "unsupported workload kind for manual restart: {other}"
                )));
            }
        }
        Ok(())
    }

    async fn scale(&self, info: &DeploymentInfo, replicas: i32) -> Result<(), OrchestratorError> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        let params = PatchParams::apply("remediation-orchestrator");

        match info.kind.as_str() {
            "Deployment" => {
                let api = self.k8s.deployments(&info.namespace);
                api.patch(&info.name, &params, &Patch::Merge(&patch))
                    .await
                    .map_err(OrchestratorError::from)?;
            }
            "StatefulSet" => {
                let api = self.k8s.stateful_sets(&info.namespace);
                api.patch(&info.name, &params, &Patch::Merge(&patch))
                    .await
                    .map_err(OrchestratorError::from)?;
            }
            other => {
                return Err(OrchestratorError::Validation(format!(
                    "cannot scale workload kind: {other}"
                )));
            }
        }
        Ok(())
    }
}

/// Pick the action for an issue type. Pure so the policy itself is unit
/// tested without a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    DeletePods,
    RestartWorkload,
    ScaleUp,
}

pub fn action_for_issue_type(issue_type: &str) -> ManualAction {
    match issue_type {
        "crash_loop" | "pod_crash_loop" | "oom_killed" => ManualAction::DeletePods,
        "resource_exhaustion" | "high_latency" => ManualAction::ScaleUp,
        _ => ManualAction::RestartWorkload,
    }
}

const SCALE_UP_INCREMENT: i32 = 1;

#[async_trait]
impl Remediator for ManualK8sRemediator {
    fn name(&self) -> &'static str {
        "manual-k8s"
    }

    fn applies_to(&self, _info: &DeploymentInfo) -> bool {
        // Always-available fallback (§4.7); the selector only reaches for
        // it when every deployment-method-specific remediator declines.
        true
    }

    fn estimated_duration(&self) -> Duration {
        // Direct in-cluster API calls; no external control-plane round trip.
        Duration::from_secs(20)
    }

    async fn execute(
        &self,
        incident: &Incident,
        info: &DeploymentInfo,
        _step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError> {
        match action_for_issue_type(&incident.issue.issue_type) {
            ManualAction::DeletePods => {
                let deleted = self.delete_pods(info).await?;
                Ok(RemediationOutcome::success(format!(
                    "deleted {deleted} pod(s) for {}/{}",
                    info.kind, info.name
                )))
            }
            ManualAction::RestartWorkload => {
                self.restart_workload(info).await?;
                Ok(RemediationOutcome::success(format!(
                    "restarted {}/{}",
                    info.kind, info.name
                )))
            }
            ManualAction::ScaleUp => {
                self.scale(info, SCALE_UP_INCREMENT).await?;
                Ok(RemediationOutcome::success(format!(
                    "scaled {}/{} up",
                    info.kind, info.name
                )))
            }
        }
    }
}
