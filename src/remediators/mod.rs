//! Remediator set (C6): the common async strategy contract and its four
//! implementations, one per deployment method.

pub mod gitops;
pub mod helm;
pub mod manual;
pub mod operator;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DeploymentInfo, Incident, Step};
use crate::error::OrchestratorError;
use crate::k8s::KubeFacade;

pub use gitops::GitopsSyncRemediator;
pub use helm::{HelmController, HelmRollbackRemediator};
pub use manual::ManualK8sRemediator;
pub use operator::OperatorReconcileRemediator;

/// Outcome of executing a single step against a remediator (§4.6).
///
/// A remediator can decline to complete without that being an
/// `OrchestratorError` — e.g. ArgoCD accepted a sync but the application
/// settled degraded rather than healthy. `ok: false` carries that case
/// back to the orchestrator alongside whether it's worth retrying.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationOutcome {
    pub ok: bool,
    pub observed_state: String,
    pub retry_advice: bool,
    pub emitted_events: Vec<String>,
}

impl RemediationOutcome {
    pub fn success(observed_state: impl Into<String>) -> Self {
        Self {
            ok: true,
            observed_state: observed_state.into(),
            retry_advice: false,
            emitted_events: Vec::new(),
        }
    }

    pub fn failure(observed_state: impl Into<String>, retry_advice: bool) -> Self {
        Self {
            ok: false,
            observed_state: observed_state.into(),
            retry_advice,
            emitted_events: Vec::new(),
        }
    }

    pub fn with_events(mut self, emitted_events: Vec<String>) -> Self {
        self.emitted_events = emitted_events;
        self
    }
}

/// Common contract every deployment-method-specific remediation strategy
/// implements. `execute` performs the action for one step; `applies_to`
/// lets the selector (C7) filter the registry down to candidates before
/// scoring.
#[async_trait]
pub trait Remediator: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, info: &DeploymentInfo) -> bool;

    /// Typical wall-clock this remediator needs to settle, used by the
    /// selector's tie-break (§4.7) and the orchestrator's per-step deadline
    /// (`min(estimated_duration * 2, global_max_step_duration)`, §4.9).
    /// Most strategies converge well inside a minute; override where not.
    fn estimated_duration(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn execute(
        &self,
        incident: &Incident,
        info: &DeploymentInfo,
        step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError>;
}

/// Holds one boxed `Remediator` per deployment method, built once at
/// startup from the active configuration and Kubernetes facade.
pub struct RemediatorRegistry {
    remediators: Vec<Box<dyn Remediator>>,
}

impl RemediatorRegistry {
    pub fn new(remediators: Vec<Box<dyn Remediator>>) -> Self {
        Self { remediators }
    }

    pub fn standard(
        k8s: KubeFacade,
        argocd_client: reqwest::Client,
        argocd_api_url: Option<String>,
        helm_controller: std::sync::Arc<dyn HelmController>,
    ) -> Self {
        let mut remediators: Vec<Box<dyn Remediator>> = Vec::new();
        if let Some(url) = argocd_api_url {
            remediators.push(Box::new(GitopsSyncRemediator::new(argocd_client, url)));
        }
        remediators.push(Box::new(HelmRollbackRemediator::new(helm_controller)));
        remediators.push(Box::new(OperatorReconcileRemediator::new(k8s.clone())));
        remediators.push(Box::new(ManualK8sRemediator::new(k8s)));
        Self { remediators }
    }

    pub fn all(&self) -> &[Box<dyn Remediator>] {
        &self.remediators
    }

    pub fn by_name(&self, name: &str) -> Option<&dyn Remediator> {
        self.remediators
            .iter()
            .find(|r| r.name() == name)
            .map(|r| r.as_ref())
    }
}
