//! PromQL scope→selector mapping and response parsing (§4.2).

use chrono::{TimeZone, Utc};

use crate::error::OrchestratorError;
use crate::metrics_provider::MetricPoint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    Namespace(String),
    Deployment { namespace: String, name: String },
    Pod { namespace: String, name: String },
}

/// Empty-container/pod label matches are always excluded, independent of
/// scope (§4.2).
const BASE_EXCLUSIONS: &str = r#"container!="",pod!="""#;

/// Append the scope's label selector to a bare metric/query expression.
///
/// This is a simplified but faithful rendition of §4.2: it assumes `query`
/// is a single metric name or an `aggregate(metric[...])` expression whose
/// innermost selector braces (if any) should receive the extra matchers.
/// For the common case — a bare metric name with no braces — it appends a
/// fresh `{...}` selector.
pub fn apply_scope(query: &str, scope: &Scope) -> String {
    let mut matchers = vec![BASE_EXCLUSIONS.to_string()];
    match scope {
        Scope::Cluster => {}
        Scope::Namespace(ns) => matchers.push(format!(r#"namespace="{ns}""#)),
        Scope::Deployment { namespace, name } => {
            matchers.push(format!(r#"namespace="{namespace}""#));
            matchers.push(format!(r#"pod=~"{name}-.*""#));
        }
        Scope::Pod { namespace, name } => {
            matchers.push(format!(r#"namespace="{namespace}""#));
            matchers.push(format!(r#"pod="{name}""#));
        }
    }

    let selector = matchers.join(",");

    if let Some(brace_start) = query.find('{') {
        let brace_end = query[brace_start..]
            .find('}')
            .map(|i| i + brace_start)
            .unwrap_or(query.len());
        let existing = &query[brace_start + 1..brace_end];
        let combined = if existing.trim().is_empty() {
            selector
        } else {
            format!("{existing},{selector}")
        };
        format!("{}{{{}}}{}", &query[..brace_start], combined, &query[brace_end + 1..])
    } else {
        format!("{query}{{{selector}}}")
    }
}

/// Parse a Prometheus `/api/v1/query` response body into a single scalar.
///
/// Returns `query_empty` (as `OrchestratorError::NotFound`) when the query
/// succeeds with zero series, and `protocol_error` on malformed payloads.
pub fn parse_instant_response(body: &serde_json::Value) -> Result<f64, OrchestratorError> {
    if body.get("status").and_then(|s| s.as_str()) != Some("success") {
        return Err(OrchestratorError::ProtocolError(
            "prometheus response status was not success".into(),
        ));
    }

    let result = body
        .pointer("/data/result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| OrchestratorError::ProtocolError("missing data.result array".into()))?;

    let Some(first) = result.first() else {
        return Err(OrchestratorError::NotFound("query_empty".into()));
    };

    let value = first
        .pointer("/value/1")
        .and_then(|v| v.as_str())
        .ok_or_else(|| OrchestratorError::ProtocolError("missing value entry".into()))?;

    value
        .parse::<f64>()
        .map_err(|_| OrchestratorError::ProtocolError(format!("unparseable sample value: {value}")))
}

/// Parse a Prometheus `/api/v1/query_range` response into a time series for
/// the first returned series (§4.2).
pub fn parse_range_response(body: &serde_json::Value) -> Result<Vec<MetricPoint>, OrchestratorError> {
    if body.get("status").and_then(|s| s.as_str()) != Some("success") {
        return Err(OrchestratorError::ProtocolError(
            "prometheus response status was not success".into(),
        ));
    }

    let result = body
        .pointer("/data/result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| OrchestratorError::ProtocolError("missing data.result array".into()))?;

    let Some(first) = result.first() else {
        return Err(OrchestratorError::NotFound("query_empty".into()));
    };

    let values = first
        .get("values")
        .and_then(|v| v.as_array())
        .ok_or_else(|| OrchestratorError::ProtocolError("missing values array".into()))?;

    let mut points = Vec::with_capacity(values.len());
    for entry in values {
        let ts = entry
            .get(0)
            .and_then(|t| t.as_f64())
            .ok_or_else(|| OrchestratorError::ProtocolError("missing sample timestamp".into()))?;
        let raw = entry
            .get(1)
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestratorError::ProtocolError("missing sample value".into()))?;
        let value: f64 = raw
            .parse()
            .map_err(|_| OrchestratorError::ProtocolError(format!("unparseable sample value: {raw}")))?;

        points.push(MetricPoint {
            timestamp: Utc
                .timestamp_opt(ts as i64, 0)
                .single()
                .unwrap_or_else(Utc::now),
            value,
        });
    }

    Ok(points)
}
