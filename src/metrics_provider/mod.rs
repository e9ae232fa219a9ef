//! Metric feature provider (C2).
//!
//! Instant/range PromQL queries, rolling statistics, trend analysis, and
//! the 45-float anomaly feature vector. No teacher analogue exists for the
//! outbound HTTP side (the teacher never queries Prometheus, only exposes
//! a scrape endpoint); the pure-computation submodules (`trend`,
//! `features`) follow the teacher's small-pure-function style
//! (`governance.rs`'s evaluate/score/classify pipeline).

pub mod features;
pub mod promql;
pub mod trend;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::cache::TtlCache;
use crate::circuit::CircuitBreaker;
use crate::error::OrchestratorError;

pub use features::{anomaly_feature_vector, FEATURE_VECTOR_LEN};
pub use promql::Scope;
pub use trend::{analyze_trend, Direction, TrendAnalysis, TrendPoint};

const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    scope: String,
}

pub struct MetricFeatureProvider {
    base_url: Option<String>,
    http: Client,
    bearer_token: Option<String>,
    cache: Arc<TtlCache<CacheKey, Vec<MetricPoint>>>,
    breaker: Arc<CircuitBreaker>,
}

impl MetricFeatureProvider {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        let bearer_token = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH)
            .ok()
            .map(|s| s.trim().to_string());

        // A mounted service-account token means this is an in-cluster
        // deployment, where the Prometheus endpoint's TLS cert is typically
        // self-signed by the cluster's own CA (§6: "TLS acceptance of
        // self-signed certs is REQUIRED in-cluster").
        let in_cluster = bearer_token.is_some();
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(in_cluster)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url,
            http,
            bearer_token,
            cache: Arc::new(TtlCache::new(DEFAULT_CACHE_TTL)),
            breaker: Arc::new(CircuitBreaker::new(5, Duration::from_secs(30))),
        }
    }

    fn request(&self, path: &str) -> Result<reqwest::RequestBuilder, OrchestratorError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| OrchestratorError::BackendUnavailable("metrics backend unconfigured".into()))?;
        let mut builder = self.http.get(format!("{base}{path}"));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Instant query at `now`, scoped per §4.2's scope→selector mapping.
    pub async fn instant_query(&self, query: &str, scope: &Scope) -> Result<f64, OrchestratorError> {
        if !self.breaker.allow().await {
            return Err(OrchestratorError::BackendUnavailable(
                "circuit open for metrics backend".into(),
            ));
        }

        let full_query = promql::apply_scope(query, scope);
        let request = self.request(&format!(
            "/api/v1/query?query={}",
            urlencode(&full_query)
        ))?;

        let result = request.send().await;
        match result {
            Ok(resp) => {
                self.breaker.record_success().await;
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;
                promql::parse_instant_response(&body)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(OrchestratorError::BackendUnavailable(e.to_string()))
            }
        }
    }

    /// Range query over `window` ending at `now`, with step resolution
    /// `step` (§4.2).
    pub async fn range_query(
        &self,
        query: &str,
        scope: &Scope,
        window: Duration,
        step: Duration,
    ) -> Result<Vec<MetricPoint>, OrchestratorError> {
        let full_query = promql::apply_scope(query, scope);
        let key = CacheKey {
            query: full_query.clone(),
            scope: format!("{scope:?}"),
        };

        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        if !self.breaker.allow().await {
            return Err(OrchestratorError::BackendUnavailable(
                "circuit open for metrics backend".into(),
            ));
        }

        let now = Utc::now();
        let start = now - chrono::Duration::from_std(window).unwrap_or_default();
        let path = format!(
            "/api/v1/query_range?query={}&start={}&end={}&step={}s",
            urlencode(&full_query),
            start.timestamp(),
            now.timestamp(),
            step.as_secs().max(1)
        );
        let request = self.request(&path)?;

        let result = request.send().await;
        let points = match result {
            Ok(resp) => {
                self.breaker.record_success().await;
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| OrchestratorError::ProtocolError(e.to_string()))?;
                promql::parse_range_response(&body)?
            }
            Err(e) => {
                self.breaker.record_failure().await;
                return Err(OrchestratorError::BackendUnavailable(e.to_string()));
            }
        };

        self.cache.put(key, points.clone()).await;
        Ok(points)
    }

    /// Current circuit state, for the deep health endpoint.
    pub async fn breaker_state(&self) -> crate::circuit::CircuitState {
        self.breaker.state().await
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
