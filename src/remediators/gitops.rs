//! GitOps-managed workload remediation: trigger an ArgoCD application sync
//! and poll until it reports healthy, grounded on the teacher's
//! `multi_cluster::client_for_context` HTTP-client-construction pattern
//! generalized to a remediator instead of a report fetcher.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::domain::{DeploymentInfo, DeploymentMethod, Incident, Step};
use crate::error::OrchestratorError;

use super::{RemediationOutcome, Remediator};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLLS: u32 = 15;

pub struct GitopsSyncRemediator {
    client: reqwest::Client,
    api_url: String,
}

impl GitopsSyncRemediator {
    pub fn new(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Read the Application's own `syncPolicy.automated.prune`/`selfHeal`
    /// before triggering a sync (§4.6 "respects prune/self-heal settings").
    /// `selfHeal` is enforced continuously by the ArgoCD controller itself,
    /// not by this one-shot sync call, so there is nothing to pass through
    /// for it beyond not fighting it; `prune` IS a parameter of the sync
    /// request, so it's read here and threaded through.
    async fn sync_policy_prune(&self, app_name: &str) -> bool {
        let url = format!("{}/api/v1/applications/{app_name}", self.api_url);
        let Ok(response) = self.client.get(&url).send().await else {
            return false;
        };
        let Ok(body) = response.json::<serde_json::Value>().await else {
            return false;
        };
        body.pointer("/spec/syncPolicy/automated/prune")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    async fn trigger_sync(&self, app_name: &str) -> Result<(), OrchestratorError> {
        let prune = self.sync_policy_prune(app_name).await;
        let url = format!("{}/api/v1/applications/{app_name}/sync", self.api_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "prune": prune }))
            .send()
            .await
            .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::BackendUnavailable(format!(
                "argocd sync request for '{app_name}' returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn poll_until_healthy(&self, app_name: &str) -> Result<(), OrchestratorError> {
        let url = format!("{}/api/v1/applications/{app_name}", self.api_url);

        for _ in 0..MAX_POLLS {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?;

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;

            let health = body.pointer("/status/health/status").and_then(|v| v.as_str());
            let sync = body.pointer("/status/sync/status").and_then(|v| v.as_str());

            if health == Some("Healthy") && sync == Some("Synced") {
                return Ok(());
            }

            sleep(POLL_INTERVAL).await;
        }

        Err(OrchestratorError::Timeout(format!(
            "argocd application '{app_name}' did not become healthy in time"
        )))
    }
}

#[async_trait]
impl Remediator for GitopsSyncRemediator {
    fn name(&self) -> &'static str {
        "gitops-sync"
    }

    fn applies_to(&self, info: &DeploymentInfo) -> bool {
        info.method == DeploymentMethod::Gitops
    }

    fn estimated_duration(&self) -> Duration {
        // Worst case: MAX_POLLS * POLL_INTERVAL spent polling, plus margin
        // for the sync call itself and ArgoCD reconciliation latency.
        POLL_INTERVAL * MAX_POLLS + Duration::from_secs(30)
    }

    async fn execute(
        &self,
        _incident: &Incident,
        info: &DeploymentInfo,
        _step: &Step,
    ) -> Result<RemediationOutcome, OrchestratorError> {
        self.trigger_sync(&info.name).await?;
        self.poll_until_healthy(&info.name).await?;
        Ok(RemediationOutcome::success(format!(
            "argocd application '{}' synced and healthy",
            info.name
        ))
        .with_events(vec![format!("argocd_sync_triggered:{}", info.name)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn deployment_info(method: DeploymentMethod) -> DeploymentInfo {
        DeploymentInfo {
            namespace: "production".into(),
            name: "payment-service".into(),
            kind: "Deployment".into(),
            method,
            managed_by: None,
            source: None,
            confidence: 0.95,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn only_applies_to_gitops_managed_deployments() {
        let remediator = GitopsSyncRemediator::new(reqwest::Client::new(), "http://argocd".into());
        assert!(remediator.applies_to(&deployment_info(DeploymentMethod::Gitops)));
        assert!(!remediator.applies_to(&deployment_info(DeploymentMethod::Helm)));
        assert!(!remediator.applies_to(&deployment_info(DeploymentMethod::Manual)));
    }
}
