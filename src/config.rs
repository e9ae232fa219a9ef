//! Environment-variable configuration (SPEC_FULL.md §6).
//!
//! Every option is documented with its default. `Config::from_env` never
//! panics on a missing variable — only on one present but unparseable.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

const KSERVE_RESERVED_SUFFIXES: &[&str] = &["NAMESPACE", "TIMEOUT", "PORT", "PREDICTOR_PORT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintPolicy {
    /// Reject a submission while a workflow is already active for the same
    /// fingerprint. Default per §9's Open Questions.
    Reject,
    /// Queue the submission behind the active workflow. FIFO among equal
    /// severities; a higher-severity incident cuts ahead of already-queued
    /// lower-severity ones for the same fingerprint (SPEC_FULL.md §3).
    Queue,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub metrics_port: u16,
    pub log_level: String,
    pub namespace: String,
    pub kubeconfig: Option<String>,
    pub argocd_api_url: Option<String>,
    pub prometheus_url: Option<String>,
    pub http_timeout: Duration,
    pub kubernetes_qps: f32,
    pub kubernetes_burst: i32,
    pub enable_cors: bool,
    pub cors_allow_origin: String,
    pub enable_kserve_integration: bool,
    pub kserve_namespace: String,
    pub kserve_predictor_port: u16,
    pub kserve_timeout: Duration,
    pub fingerprint_policy: FingerprintPolicy,
    /// Raw `KSERVE_<MODEL>_SERVICE` entries, model name (upper, with
    /// underscores) -> service name. Consumed by `inference::discovery`.
    pub kserve_model_services: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            metrics_port: 9090,
            log_level: "info".to_string(),
            namespace: "default".to_string(),
            kubeconfig: None,
            argocd_api_url: None,
            prometheus_url: None,
            http_timeout: Duration::from_secs(10),
            kubernetes_qps: 20.0,
            kubernetes_burst: 40,
            enable_cors: false,
            cors_allow_origin: "*".to_string(),
            enable_kserve_integration: false,
            kserve_namespace: "default".to_string(),
            kserve_predictor_port: 8080,
            kserve_timeout: Duration::from_secs(5),
            fingerprint_policy: FingerprintPolicy::Reject,
            kserve_model_services: HashMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_map(&std::env::vars().collect())
    }

    /// Testable entry point: build from an explicit map instead of the
    /// process environment.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let mut cfg = Config::default();

        if let Some(v) = vars.get("PORT") {
            cfg.port = v.parse().context("PORT must be a u16")?;
        }
        if let Some(v) = vars.get("METRICS_PORT") {
            cfg.metrics_port = v.parse().context("METRICS_PORT must be a u16")?;
        }
        if let Some(v) = vars.get("LOG_LEVEL") {
            validate_log_level(v)?;
            cfg.log_level = v.clone();
        }
        if let Some(v) = vars.get("NAMESPACE") {
            cfg.namespace = v.clone();
        }
        if let Some(v) = vars.get("KUBECONFIG") {
            cfg.kubeconfig = Some(v.clone());
        }
        if let Some(v) = vars.get("ARGOCD_API_URL") {
            cfg.argocd_api_url = Some(v.clone());
        }
        if let Some(v) = vars.get("PROMETHEUS_URL") {
            cfg.prometheus_url = Some(v.clone());
        }
        if let Some(v) = vars.get("HTTP_TIMEOUT") {
            let secs: u64 = v.parse().context("HTTP_TIMEOUT must be seconds (u64)")?;
            cfg.http_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = vars.get("KUBERNETES_QPS") {
            cfg.kubernetes_qps = v.parse().context("KUBERNETES_QPS must be a float")?;
        }
        if let Some(v) = vars.get("KUBERNETES_BURST") {
            cfg.kubernetes_burst = v.parse().context("KUBERNETES_BURST must be an i32")?;
        }
        if let Some(v) = vars.get("ENABLE_CORS") {
            cfg.enable_cors = parse_bool(v).context("ENABLE_CORS must be true/false")?;
        }
        if let Some(v) = vars.get("CORS_ALLOW_ORIGIN") {
            cfg.cors_allow_origin = v.clone();
        }
        if let Some(v) = vars.get("ENABLE_KSERVE_INTEGRATION") {
            cfg.enable_kserve_integration =
                parse_bool(v).context("ENABLE_KSERVE_INTEGRATION must be true/false")?;
        }
        if let Some(v) = vars.get("KSERVE_NAMESPACE") {
            cfg.kserve_namespace = v.clone();
        }
        if let Some(v) = vars.get("KSERVE_PREDICTOR_PORT") {
            cfg.kserve_predictor_port = v
                .parse()
                .context("KSERVE_PREDICTOR_PORT must be a u16")?;
        }
        if let Some(v) = vars.get("KSERVE_TIMEOUT") {
            let secs: u64 = v.parse().context("KSERVE_TIMEOUT must be seconds (u64)")?;
            cfg.kserve_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = vars.get("FINGERPRINT_POLICY") {
            cfg.fingerprint_policy = parse_fingerprint_policy(v)?;
        }

        cfg.kserve_model_services = discover_kserve_services(vars);

        Ok(cfg)
    }
}

/// Scan for `KSERVE_<MODEL>_SERVICE` keys, excluding reserved
/// `KSERVE_<fixed-suffix>` keys (§4.3).
fn discover_kserve_services(vars: &HashMap<String, String>) -> HashMap<String, String> {
    let mut found = HashMap::new();
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix("KSERVE_") else {
            continue;
        };
        let Some(model) = rest.strip_suffix("_SERVICE") else {
            continue;
        };
        if model.is_empty() || KSERVE_RESERVED_SUFFIXES.contains(&model) {
            continue;
        }
        found.insert(model.to_string(), value.clone());
    }
    found
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("cannot parse '{other}' as a boolean"),
    }
}

fn validate_log_level(v: &str) -> Result<()> {
    match v {
        "debug" | "info" | "warn" | "error" | "fatal" | "panic" => Ok(()),
        other => anyhow::bail!("unknown LOG_LEVEL '{other}'"),
    }
}

fn parse_fingerprint_policy(v: &str) -> Result<FingerprintPolicy> {
    match v.to_ascii_lowercase().as_str() {
        "reject" => Ok(FingerprintPolicy::Reject),
        "queue" => Ok(FingerprintPolicy::Queue),
        other => anyhow::bail!("unknown FINGERPRINT_POLICY '{other}', expected reject or queue"),
    }
}
