//! Error taxonomy (SPEC_FULL.md §7).
//!
//! Remediators and clients surface one of these kinds; the orchestrator
//! maps kinds to retry policy and the HTTP layer maps them to status codes.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no remediator available: {0}")]
    NoRemediator(String),
}

impl OrchestratorError {
    /// Transient failures get retried with backoff; everything else fails
    /// the step immediately (§7).
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::BackendUnavailable(_)
                | OrchestratorError::Timeout(_)
                | OrchestratorError::Conflict(_)
        )
    }

    /// HTTP status the REST surface maps this error kind onto.
    pub fn status_code(&self) -> u16 {
        match self {
            OrchestratorError::Validation(_) => 400,
            OrchestratorError::NotFound(_) => 404,
            OrchestratorError::Forbidden(_) => 403,
            OrchestratorError::BackendUnavailable(_) => 503,
            OrchestratorError::ProtocolError(_) => 502,
            OrchestratorError::Timeout(_) => 504,
            OrchestratorError::Cancelled => 499,
            OrchestratorError::Conflict(_) => 409,
            OrchestratorError::NoRemediator(_) => 422,
        }
    }

    /// Stable machine-readable code for the `{error_code, message}` API
    /// envelope (§7).
    pub fn error_code(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "validation",
            OrchestratorError::NotFound(_) => "not_found",
            OrchestratorError::Forbidden(_) => "forbidden",
            OrchestratorError::BackendUnavailable(_) => "backend_unavailable",
            OrchestratorError::ProtocolError(_) => "protocol_error",
            OrchestratorError::Timeout(_) => "timeout",
            OrchestratorError::Cancelled => "cancelled",
            OrchestratorError::Conflict(_) => "conflict",
            OrchestratorError::NoRemediator(_) => "no_remediator",
        }
    }
}

impl From<kube::Error> for OrchestratorError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => {
                OrchestratorError::NotFound(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 403 => {
                OrchestratorError::Forbidden(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 409 => {
                OrchestratorError::Conflict(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code >= 500 => {
                OrchestratorError::BackendUnavailable(resp.message.clone())
            }
            other => OrchestratorError::BackendUnavailable(other.to_string()),
        }
    }
}
