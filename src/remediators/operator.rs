//! Operator-managed workload remediation: bump a reconcile-trigger
//! annotation on the owning custom resource (or, lacking one, directly on
//! the workload), the same `Patch::Strategic` annotation-bump idiom as
//! `enforcement::apply_remediation`'s per-kind dispatch, generalized to
//! dynamic resources via `kube::discovery`.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::discovery::Discovery;

use crate::domain::{DeploymentInfo, DeploymentMethod, Incident, Step};
use crate::error::OrchestratorError;
use crate::k8s::KubeFacade;

use super::{RemediationOutcome, Remediator};

const RECONCILE_ANNOTATION: &str = "remediation-orchestrator.io/reconcile-at";

pub struct OperatorReconcileRemediator {
    k8s: KubeFacade,
}

/// `managed_by` is formatted `"Kind/name"` by the detector when the
/// signal came from an owner-reference custom resource (§4.4). Kept as a
/// free function so it stays unit-testable without a live `KubeFacade`.
fn owning_custom_resource(info: &DeploymentInfo) -> Option<(&str, &str)> {
    let managed_by = info.managed_by.as_deref()?;
    managed_by.split_once('/')
}

impl OperatorReconcileRemediator {
    pub fn new(k8s: KubeFacade) -> Self {
        Self { k8s }
    }

    async fn bump_custom_resource(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<(), OrchestratorError> {
        let discovery = Discovery::new(self.k8s.client().clone())
            .run()
            .await
            .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?;

        let resource = discovery
            .groups()
            .flat_map(|g| g.resources_by_stability())
            .find(|(ar, _)| ar.kind == kind)
            .map(|(ar, _)| ar)
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("no API resource registered for kind '{kind}'"))
            })?;

        let patch = serde_json::json!({
            "metadata": {
                "annotations": {
                    RECONCILE_ANNOTATION: chrono::Utc::now().to_rfc3339()
                }
            }
        });

        self.k8s
            .patch_dynamic(&resource, Some(namespace), name, &patch)
            .await?;
        Ok(())
    }

    async fn bump_workload(&self, info: &DeploymentInfo) -> Result<(), OrchestratorError> {
        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            RECONCILE_ANNOTATION: chrono::Utc::now().to_rfc3339()
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
                    "unsupported workload kind for operator reconcile: {other}"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Remediator for OperatorReconcileRemediator {
    fn name(&self) -> &'static str {
        "operator-reconcile"
    }

    fn applies_to(&self, info: &DeploymentInfo) -> bool {
        info.method == DeploymentMethod::Operator
    }

    fn estimated_duration(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn execute(
        &self,
        _incident: &Incident,
        info: &DeploymentInfo,
        _step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError> {
        if let Some((kind, name)) = owning_custom_resource(info) {
            self.bump_custom_resource(&info.namespace, kind, name).await?;
            return Ok(RemediationOutcome::success(format!(
                "bumped reconcile annotation on {kind}/{name}"
            )));
        }

        self.bump_workload(info).await?;
        Ok(RemediationOutcome::success(format!(
            "bumped reconcile annotation on {}/{}",
            info.kind, info.name
        )))
    }
}
