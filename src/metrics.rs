//! Process-scoped Prometheus metrics registry (C11).
//!
//! One `Registry`, force-initialized at startup, exactly as
//! `commands::reconcile`'s per-command statics in the teacher — except here
//! it's the single shared instance every component records into, per §9's
//! design note that the metrics registry is the one deliberate
//! process-wide singleton.

use std::sync::LazyLock;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static REMEDIATION_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "remediation_total",
            "Total remediation workflow executions",
        ),
        &["method", "issue_type"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

pub static REMEDIATION_SUCCESS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "remediation_success_total",
            "Total remediation workflows that completed successfully",
        ),
        &["method", "issue_type"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

pub static REMEDIATION_FAILURE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "remediation_failure_total",
            "Total remediation workflows that ended in failure",
        ),
        &["method", "issue_type", "error_type"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

pub static STEP_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new("remediation_step_total", "Total remediation step attempts"),
        &["remediator", "status"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

pub static STRATEGY_SELECTION_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "strategy_selection_total",
            "Total strategy selector decisions",
        ),
        &["strategy"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

pub static REMEDIATION_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(HistogramOpts::new(
        "remediation_duration_seconds",
        "End-to-end workflow duration in seconds",
    ))
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(h.clone()))
        .expect("metric not yet registered");
    h
});

pub static STEP_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(HistogramOpts::new(
        "remediation_step_duration_seconds",
        "Per-step remediator execution duration in seconds",
    ))
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(h.clone()))
        .expect("metric not yet registered");
    h
});

pub static ACTIVE_WORKFLOWS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let g = IntGaugeVec::new(
        Opts::new("active_workflows", "Currently in-progress workflows"),
        &["method"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(g.clone()))
        .expect("metric not yet registered");
    g
});

pub static REMEDIATOR_HEALTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let g = IntGaugeVec::new(
        Opts::new(
            "remediator_health",
            "Remediator health (1=healthy, 0=unhealthy)",
        ),
        &["remediator"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(g.clone()))
        .expect("metric not yet registered");
    g
});

/// Force every metric into existence so `/metrics` reports a zero rather
/// than omitting a series that hasn't fired yet.
pub fn init() {
    LazyLock::force(&REMEDIATION_TOTAL);
    LazyLock::force(&REMEDIATION_SUCCESS_TOTAL);
    LazyLock::force(&REMEDIATION_FAILURE_TOTAL);
    LazyLock::force(&STEP_TOTAL);
    LazyLock::force(&STRATEGY_SELECTION_TOTAL);
    LazyLock::force(&REMEDIATION_DURATION_SECONDS);
    LazyLock::force(&STEP_DURATION_SECONDS);
    LazyLock::force(&ACTIVE_WORKFLOWS);
    LazyLock::force(&REMEDIATOR_HEALTH);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_registers_every_metric_exactly_once() {
        init();
        init();
        let families = REGISTRY.gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.contains(&"remediation_total".to_string()));
        assert!(names.contains(&"active_workflows".to_string()));
    }
}
