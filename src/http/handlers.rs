//! Route handlers for the app-facing HTTP surface (§6).
//!
//! Follows `commands::webhook::admission_handler`'s shape — extract,
//! dispatch, map to a `(StatusCode, body)` pair — generalized from one
//! admission endpoint into the five routes this crate serves.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::circuit::CircuitState;
use crate::domain::{Incident, Issue, ResourceRef, Severity, Workflow, WorkflowId};
use crate::error::OrchestratorError;
use crate::metrics;

use super::AppState;

/// `{error_code, message, details?}` envelope every error path returns (§7).
#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error_code: self.error_code(),
            message: self.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

/* ============================= GET /health ============================= */

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
    version: &'static str,
}

pub async fn liveness() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(Liveness {
            status: "ok",
            version: super::VERSION,
        }),
    )
}

/* ============================= GET /api/v1/health ============================= */

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum DependencyStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Disabled,
}

impl From<CircuitState> for DependencyStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => DependencyStatus::Healthy,
            CircuitState::HalfOpen => DependencyStatus::Degraded,
            CircuitState::Open => DependencyStatus::Unhealthy,
        }
    }
}

#[derive(Debug, Serialize)]
struct Dependencies {
    kubernetes: DependencyStatus,
    inference: DependencyStatus,
    metrics: DependencyStatus,
}

#[derive(Debug, Serialize)]
struct RbacSummary {
    verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
struct DeepHealth {
    status: OverallStatus,
    dependencies: Dependencies,
    rbac: RbacSummary,
    uptime_seconds: u64,
}

pub async fn deep_health(State(state): State<AppState>) -> impl IntoResponse {
    let kubernetes = match state.k8s.verify_connectivity().await {
        Ok(()) => DependencyStatus::Healthy,
        Err(_) => DependencyStatus::Unhealthy,
    };

    let inference = match &state.inference {
        Some(proxy) => proxy.breaker_state().await.into(),
        None => DependencyStatus::Disabled,
    };

    let metrics_dep = match &state.metrics_provider {
        Some(provider) if provider.is_configured() => provider.breaker_state().await.into(),
        _ => DependencyStatus::Disabled,
    };

    let overall = if kubernetes == DependencyStatus::Unhealthy {
        OverallStatus::Unhealthy
    } else if inference == DependencyStatus::Unhealthy || metrics_dep == DependencyStatus::Unhealthy
    {
        OverallStatus::Degraded
    } else {
        OverallStatus::Healthy
    };

    let status_code = match overall {
        OverallStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let body = DeepHealth {
        status: overall,
        dependencies: Dependencies {
            kubernetes,
            inference,
            metrics: metrics_dep,
        },
        rbac: RbacSummary { verified: true },
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };

    (status_code, Json(body))
}

/* ============================= POST /api/v1/remediation/trigger ============================= */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub incident_id: Uuid,
    pub namespace: String,
    pub resource: ResourceRef,
    pub issue: Issue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub workflow_id: WorkflowId,
    pub status: String,
    pub deployment_method: String,
    pub estimated_duration: u64,
}

/// Placeholder estimate until a real per-remediator duration model exists;
/// matches the default `estimated_duration_secs` the selector falls back to
/// when the registry doesn't supply one.
const DEFAULT_ESTIMATED_DURATION_SECS: u64 = 60;

pub async fn trigger_remediation(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let incident = Incident {
        id: req.incident_id,
        namespace: req.namespace,
        resource: req.resource,
        issue: req.issue,
        created_at: chrono::Utc::now(),
    };

    let workflow_id = state.orchestrator.submit(incident).await?;
    let workflow = state
        .orchestrator
        .get(workflow_id)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("workflow {workflow_id} not found")))?;

    let body = TriggerResponse {
        workflow_id,
        status: format!("{:?}", workflow.status).to_lowercase(),
        deployment_method: format!("{:?}", workflow.deployment_method).to_lowercase(),
        estimated_duration: DEFAULT_ESTIMATED_DURATION_SECS,
    };

    Ok((StatusCode::ACCEPTED, Json(body)))
}

/* ============================= GET /api/v1/incidents ============================= */

#[derive(Debug, Deserialize)]
pub struct ListIncidentsQuery {
    pub namespace: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<usize>,
}

fn parse_severity(raw: &str) -> Result<Severity, OrchestratorError> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Ok(Severity::Low),
        "medium" => Ok(Severity::Medium),
        "high" => Ok(Severity::High),
        "critical" => Ok(Severity::Critical),
        other => Err(OrchestratorError::Validation(format!(
            "unknown severity '{other}'"
        ))),
    }
}

pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let severity = query.severity.as_deref().map(parse_severity).transpose()?;
    let incidents = state
        .orchestrator
        .list_incidents(query.namespace.as_deref(), severity, query.limit)
        .await;
    Ok(Json(incidents))
}

/* ============================= GET /api/v1/workflows/:id ============================= */

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Workflow>, OrchestratorError> {
    let workflow = state
        .orchestrator
        .get(id)
        .await?
        .ok_or_else(|| OrchestratorError::NotFound(format!("workflow {id} not found")))?;
    Ok(Json(workflow))
}

/* ============================= GET /metrics ============================= */

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics::REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "metrics encoding error".to_string(),
            ),
        },
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "metrics encoding error".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_status_maps_circuit_state() {
        assert_eq!(DependencyStatus::from(CircuitState::Closed), DependencyStatus::Healthy);
        assert_eq!(DependencyStatus::from(CircuitState::HalfOpen), DependencyStatus::Degraded);
        assert_eq!(DependencyStatus::from(CircuitState::Open), DependencyStatus::Unhealthy);
    }

    #[test]
    fn parse_severity_accepts_known_values_case_insensitively() {
        assert_eq!(parse_severity("HIGH").unwrap(), Severity::High);
        assert_eq!(parse_severity("low").unwrap(), Severity::Low);
    }

    #[test]
    fn parse_severity_rejects_unknown_values() {
        assert!(parse_severity("urgent").is_err());
    }

    #[test]
    fn error_into_response_maps_status_codes() {
        let resp = OrchestratorError::NotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
