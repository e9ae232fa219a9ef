//! Inference proxy (C3).
//!
//! Sends feature vectors to externally deployed prediction models
//! discovered from configuration, tolerating the shape variance model
//! authors introduce independently (§4.3, §9 design notes).

pub mod discovery;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::circuit::CircuitBreaker;
use crate::error::OrchestratorError;

pub use discovery::Model;

const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// ≥0.5 ⇒ high, ≥0.2 ⇒ medium, else low (§4.3). Exhaustive and total (§8).
pub fn risk_level_from_anomaly_rate(anomaly_rate: f64) -> RiskLevel {
    if anomaly_rate >= 0.5 {
        RiskLevel::High
    } else if anomaly_rate >= 0.2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn anomaly_rate(predictions: &[i64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let anomalies = predictions.iter().filter(|&&p| p == -1).count();
    anomalies as f64 / predictions.len() as f64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastSeries {
    pub forecast: Vec<f64>,
    #[serde(default)]
    pub horizon: Option<u32>,
    #[serde(default)]
    pub confidence: Vec<f64>,
}

const DEFAULT_FORECAST_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResponse {
    Anomaly { predictions: Vec<i64> },
    Forecast { series: HashMap<String, ForecastSeries> },
}

/// Parse a raw predict-response body, dispatching on the model name first
/// and falling back to shape auto-detection (§4.3).
pub fn parse_prediction_response(
    model_name: &str,
    body: &serde_json::Value,
) -> Result<PredictionResponse, OrchestratorError> {
    let predictions = body
        .get("predictions")
        .ok_or_else(|| OrchestratorError::ProtocolError("missing predictions field".into()))?;

    if model_name.contains("anomaly") {
        return parse_anomaly_shape(predictions);
    }
    if model_name.contains("forecast") {
        return parse_forecast_shape(predictions);
    }

    // auto-detect by shape
    if let Some(arr) = predictions.as_array() {
        if arr.iter().all(|v| v.is_i64() || v.is_u64()) {
            return parse_anomaly_shape(predictions);
        }
    }
    parse_forecast_shape(predictions)
}

fn parse_anomaly_shape(predictions: &serde_json::Value) -> Result<PredictionResponse, OrchestratorError> {
    let arr = predictions
        .as_array()
        .ok_or_else(|| OrchestratorError::ProtocolError("predictions is not an array".into()))?;
    let values = arr
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| OrchestratorError::ProtocolError("non-integer prediction".into())))
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(PredictionResponse::Anomaly { predictions: values })
}

fn parse_forecast_shape(predictions: &serde_json::Value) -> Result<PredictionResponse, OrchestratorError> {
    // Nested object form: {metric: {forecast: [...], horizon, confidence: [...]}}
    if let Some(obj) = predictions.as_object() {
        let mut series = HashMap::new();
        for (metric, value) in obj {
            let parsed: ForecastSeries = serde_json::from_value(value.clone())
                .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;
            series.insert(metric.clone(), parsed);
        }
        return Ok(PredictionResponse::Forecast { series });
    }

    // Array form: [[cpu, mem], ...] — index 0 => cpu_usage, index 1 => memory_usage.
    if let Some(rows) = predictions.as_array() {
        let mut cpu_forecast = Vec::new();
        let mut mem_forecast = Vec::new();
        for row in rows {
            let pair = row
                .as_array()
                .ok_or_else(|| OrchestratorError::ProtocolError("forecast row is not an array".into()))?;
            let cpu = pair
                .first()
                .and_then(|v| v.as_f64())
                .ok_or_else(|| OrchestratorError::ProtocolError("missing cpu forecast value".into()))?;
            let mem = pair
                .get(1)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| OrchestratorError::ProtocolError("missing memory forecast value".into()))?;
            cpu_forecast.push(cpu);
            mem_forecast.push(mem);
        }

        let mut series = HashMap::new();
        series.insert(
            "cpu_usage".to_string(),
            ForecastSeries {
                horizon: Some(cpu_forecast.len() as u32),
                confidence: vec![DEFAULT_FORECAST_CONFIDENCE; cpu_forecast.len()],
                forecast: cpu_forecast,
            },
        );
        series.insert(
            "memory_usage".to_string(),
            ForecastSeries {
                horizon: Some(mem_forecast.len() as u32),
                confidence: vec![DEFAULT_FORECAST_CONFIDENCE; mem_forecast.len()],
                forecast: mem_forecast,
            },
        );
        return Ok(PredictionResponse::Forecast { series });
    }

    Err(OrchestratorError::ProtocolError(
        "predictions has an unrecognized shape".into(),
    ))
}

/// Dynamic-discovery-backed client over the discovered model set.
pub struct InferenceProxy {
    http: Client,
    models: Arc<RwLock<Vec<Model>>>,
    namespace: String,
    predictor_port: u16,
    breaker: Arc<CircuitBreaker>,
}

impl InferenceProxy {
    pub fn new(
        services: HashMap<String, String>,
        namespace: String,
        predictor_port: u16,
        timeout: Duration,
    ) -> Self {
        // Same in-cluster signal as the metric feature provider (§6:
        // self-signed certs MUST be accepted in-cluster) — predictor
        // endpoints are usually plain HTTP inside the cluster, but some
        // KServe installs front them with a TLS-terminating sidecar using
        // the cluster's self-signed CA.
        let in_cluster = std::path::Path::new(SERVICE_ACCOUNT_TOKEN_PATH).exists();
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(in_cluster)
            .build()
            .unwrap_or_else(|_| Client::new());
        let models = discovery::build_models(&services, &namespace, predictor_port);

        Self {
            http,
            models: Arc::new(RwLock::new(models)),
            namespace,
            predictor_port,
            breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
        }
    }

    /// Re-scan configuration for model services at runtime (§4.3).
    pub async fn refresh(&self, services: HashMap<String, String>) {
        let models = discovery::build_models(&services, &self.namespace, self.predictor_port);
        *self.models.write().await = models;
    }

    pub async fn models(&self) -> Vec<Model> {
        self.models.read().await.clone()
    }

    async fn find_model(&self, name: &str) -> Result<Model, OrchestratorError> {
        self.models
            .read()
            .await
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(format!("model '{name}' not found")))
    }

    pub async fn predict(
        &self,
        model_name: &str,
        instances: Vec<Vec<f64>>,
    ) -> Result<PredictionResponse, OrchestratorError> {
        let model = self.find_model(model_name).await?;

        if !self.breaker.allow().await {
            return Err(OrchestratorError::BackendUnavailable(format!(
                "circuit open for model '{model_name}'"
            )));
        }

        let url = format!("{}/v1/models/model:predict", model.url);
        let body = serde_json::json!({ "instances": instances });

        let response = self.http.post(&url).json(&body).send().await;
        let response = match response {
            Ok(r) => {
                self.breaker.record_success().await;
                r
            }
            Err(e) => {
                self.breaker.record_failure().await;
                return Err(OrchestratorError::BackendUnavailable(e.to_string()));
            }
        };

        if !response.status().is_success() {
            return Err(OrchestratorError::BackendUnavailable(format!(
                "model '{model_name}' returned status {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;

        parse_prediction_response(model_name, &payload)
    }

    pub async fn health(&self, model_name: &str) -> Result<bool, OrchestratorError> {
        let model = self.find_model(model_name).await?;
        let url = format!("{}/v1/models/model", model.url);
        match self.http.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Current circuit state, for the deep health endpoint — cheap and
    /// non-blocking, unlike `health()` which makes a live call.
    pub async fn breaker_state(&self) -> crate::circuit::CircuitState {
        self.breaker.state().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_mapping_is_exhaustive_and_total() {
        assert_eq!(risk_level_from_anomaly_rate(0.0), RiskLevel::Low);
        assert_eq!(risk_level_from_anomaly_rate(0.19), RiskLevel::Low);
        assert_eq!(risk_level_from_anomaly_rate(0.2), RiskLevel::Medium);
        assert_eq!(risk_level_from_anomaly_rate(0.49), RiskLevel::Medium);
        assert_eq!(risk_level_from_anomaly_rate(0.5), RiskLevel::High);
        assert_eq!(risk_level_from_anomaly_rate(1.0), RiskLevel::High);
    }

    #[test]
    fn anomaly_rate_counts_negative_one_predictions() {
        assert_eq!(anomaly_rate(&[1, 1, -1, 1, -1]), 0.4);
        assert_eq!(anomaly_rate(&[]), 0.0);
    }

    #[test]
    fn parses_anomaly_style_response_by_model_name() {
        let body = serde_json::json!({"predictions": [1, -1, 1]});
        let parsed = parse_prediction_response("anomaly-detector", &body).unwrap();
        assert_eq!(
            parsed,
            PredictionResponse::Anomaly {
                predictions: vec![1, -1, 1]
            }
        );
    }

    #[test]
    fn parses_nested_forecast_shape() {
        let body = serde_json::json!({
            "predictions": {
                "cpu_usage": {"forecast": [0.5, 0.6], "horizon": 2, "confidence": [0.9, 0.9]}
            }
        });
        let parsed = parse_prediction_response("forecaster", &body).unwrap();
        match parsed {
            PredictionResponse::Forecast { series } => {
                assert_eq!(series["cpu_usage"].forecast, vec![0.5, 0.6]);
            }
            _ => panic!("expected forecast shape"),
        }
    }

    #[test]
    fn converts_array_forecast_shape_into_nested_form() {
        let body = serde_json::json!({
            "predictions": [[0.1, 0.2], [0.3, 0.4]]
        });
        let parsed = parse_prediction_response("forecaster", &body).unwrap();
        match parsed {
            PredictionResponse::Forecast { series } => {
                assert_eq!(series["cpu_usage"].forecast, vec![0.1, 0.3]);
                assert_eq!(series["memory_usage"].forecast, vec![0.2, 0.4]);
                assert_eq!(series["cpu_usage"].confidence, vec![0.85, 0.85]);
            }
            _ => panic!("expected forecast shape"),
        }
    }

    #[test]
    fn auto_detects_anomaly_shape_from_integer_array() {
        let body = serde_json::json!({"predictions": [1, 1, -1]});
        let parsed = parse_prediction_response("unnamed-model", &body).unwrap();
        assert!(matches!(parsed, PredictionResponse::Anomaly { .. }));
    }

    #[test]
    fn missing_predictions_field_is_protocol_error() {
        let body = serde_json::json!({});
        let err = parse_prediction_response("anomaly-detector", &body).unwrap_err();
        assert!(matches!(err, OrchestratorError::ProtocolError(_)));
    }
}
