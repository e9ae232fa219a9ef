//! 45-float anomaly feature vector (§4.2).
//!
//! Five base metrics × nine derived values each. Any subquery that fails
//! is substituted with a documented default rather than aborting the whole
//! vector (§4.2, §7's "metric backend unavailable -> use default feature
//! vector" degradation policy) — the output is always exactly 45 finite
//! floats (§8).

use crate::error::OrchestratorError;
use crate::metrics_provider::{MetricFeatureProvider, Scope};

pub const FEATURE_VECTOR_LEN: usize = 45;
const VALUES_PER_METRIC: usize = 9;

#[derive(Debug, Clone, Copy)]
pub struct BaseMetric {
    pub query: &'static str,
    pub default: f64,
}

pub const BASE_METRICS: [BaseMetric; 5] = [
    BaseMetric { query: "node-cpu-util", default: 0.5 },
    BaseMetric { query: "node-mem-util", default: 0.5 },
    BaseMetric { query: "pod-cpu", default: 0.5 },
    BaseMetric { query: "pod-mem-ratio", default: 0.5 },
    BaseMetric { query: "restart-count", default: 0.0 },
];

const DELTA_DEFAULT: f64 = 0.0;

/// Raw query outcomes for one base metric's five PromQL-backed fields
/// (value, mean_5m, std_5m, min_5m, max_5m, lag_1, lag_5). `diff` and
/// `pct_change` are always derived, never queried directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMetricSamples {
    pub value: Option<f64>,
    pub mean_5m: Option<f64>,
    pub std_5m: Option<f64>,
    pub min_5m: Option<f64>,
    pub max_5m: Option<f64>,
    pub lag_1: Option<f64>,
    pub lag_5: Option<f64>,
}

/// Turn one metric's raw samples into its 9-float contribution, applying
/// the documented default on any missing field.
fn assemble_metric(samples: &RawMetricSamples, default: f64) -> [f64; VALUES_PER_METRIC] {
    let value = samples.value.unwrap_or(default);
    let mean_5m = samples.mean_5m.unwrap_or(default);
    let std_5m = samples.std_5m.unwrap_or(DELTA_DEFAULT);
    let min_5m = samples.min_5m.unwrap_or(default);
    let max_5m = samples.max_5m.unwrap_or(default);
    let lag_1 = samples.lag_1.unwrap_or(default);
    let lag_5 = samples.lag_5.unwrap_or(default);

    let diff = match (samples.value, samples.lag_1) {
        (Some(v), Some(l)) => v - l,
        _ => DELTA_DEFAULT,
    };
    let pct_change = match (samples.value, samples.lag_1) {
        (Some(v), Some(l)) if l.abs() > f64::EPSILON => (v - l) / l,
        _ => DELTA_DEFAULT,
    };

    [value, mean_5m, std_5m, min_5m, max_5m, lag_1, lag_5, diff, pct_change]
}

/// Pure assembler: five metrics' raw samples in, one finite 45-float
/// vector out. Kept separate from the async fetch path so the assembly
/// logic (defaulting, diff/pct_change derivation, ordering) is unit
/// testable without a network call.
pub fn assemble_vector(samples: &[RawMetricSamples; 5]) -> [f64; FEATURE_VECTOR_LEN] {
    let mut vector = [0.0_f64; FEATURE_VECTOR_LEN];
    for (i, (metric, raw)) in BASE_METRICS.iter().zip(samples.iter()).enumerate() {
        let contribution = assemble_metric(raw, metric.default);
        vector[i * VALUES_PER_METRIC..(i + 1) * VALUES_PER_METRIC].copy_from_slice(&contribution);
    }
    vector
}

/// Fetch the full anomaly feature vector for `scope`, querying the
/// provider for every base metric and substituting defaults on failure.
/// Never returns `Err` for subquery failures — only a vector assembly
/// step, so the result is always a complete, finite 45-float vector.
pub async fn anomaly_feature_vector(
    provider: &MetricFeatureProvider,
    scope: &Scope,
) -> [f64; FEATURE_VECTOR_LEN] {
    let mut samples = [RawMetricSamples::default(); 5];

    for (i, metric) in BASE_METRICS.iter().enumerate() {
        samples[i] = fetch_metric_samples(provider, metric.query, scope).await;
    }

    assemble_vector(&samples)
}

async fn fetch_metric_samples(
    provider: &MetricFeatureProvider,
    query: &str,
    scope: &Scope,
) -> RawMetricSamples {
    let value = query_or_none(provider, query, scope).await;
    let mean_5m = query_or_none(provider, &format!("avg_over_time({query}[5m])"), scope).await;
    let std_5m = query_or_none(provider, &format!("stddev_over_time({query}[5m])"), scope).await;
    let min_5m = query_or_none(provider, &format!("min_over_time({query}[5m])"), scope).await;
    let max_5m = query_or_none(provider, &format!("max_over_time({query}[5m])"), scope).await;
    let lag_1 = query_or_none(provider, &format!("{query} offset 1m"), scope).await;
    let lag_5 = query_or_none(provider, &format!("{query} offset 5m"), scope).await;

    RawMetricSamples {
        value,
        mean_5m,
        std_5m,
        min_5m,
        max_5m,
        lag_1,
        lag_5,
    }
}

async fn query_or_none(
    provider: &MetricFeatureProvider,
    query: &str,
    scope: &Scope,
) -> Option<f64> {
    match provider.instant_query(query, scope).await {
        Ok(v) if v.is_finite() => Some(v),
        Ok(_) => None,
        Err(e) => {
            debug_assert!(is_valid_error(&e), "unexpected error variant from instant_query: {e:?}");
            None
        }
    }
}

/// Clamp a rolling-mean normalization input to `[0, 1]` (§4.2).
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn is_valid_error(err: &OrchestratorError) -> bool {
    // Every OrchestratorError variant is a legitimate reason to fall back
    // to the default; kept as a named predicate so the call site at
    // `query_or_none` reads as a deliberate policy rather than a blanket
    // catch-all.
    matches!(
        err,
        OrchestratorError::BackendUnavailable(_)
            | OrchestratorError::NotFound(_)
            | OrchestratorError::ProtocolError(_)
            | OrchestratorError::Timeout(_)
    )
}
