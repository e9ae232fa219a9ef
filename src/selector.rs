//! Strategy selector (C7).
//!
//! Pure function over `&DeploymentInfo` and the registered remediators —
//! filter, score, pick — in the same small-pure-function style as
//! `multi_cluster::aggregate_report`'s weighted-average scoring.

use std::collections::HashMap;

use crate::domain::{DeploymentInfo, DeploymentMethod};
use crate::remediators::Remediator;

const WEIGHT_CONFIDENCE: f64 = 0.6;
const WEIGHT_HEALTH: f64 = 0.3;
const WEIGHT_SUCCESS_RATE: f64 = 0.1;

pub const MANUAL_FALLBACK_NAME: &str = "manual-k8s";

/// Confidence-match baseline for a candidate that only qualifies as the
/// generic fallback (today, always `manual-k8s` via its always-true
/// `applies_to`) rather than as the method's native remediator. Keeps a
/// fallback from out-scoring a correctly-matched strategy purely because
/// it carries a shorter estimated duration.
const FALLBACK_CONFIDENCE_MATCH: f64 = 0.5;

/// Per-remediator signals the selector scores against, kept separate from
/// the `Remediator` trait itself so scoring stays pure and testable
/// without constructing live remediator instances.
#[derive(Debug, Clone, Copy)]
pub struct RemediatorSignal<'a> {
    pub name: &'a str,
    pub applies: bool,
    /// How well this specific candidate matches the detected deployment
    /// method — the detector's `confidence` for the method's native
    /// remediator, `FALLBACK_CONFIDENCE_MATCH` for any other applicable
    /// candidate (§4.7's `confidence_match`).
    pub confidence_match: f64,
    pub health_score: f64,
    pub recent_success_rate: f64,
    pub estimated_duration_secs: f64,
}

fn score(signal: &RemediatorSignal) -> f64 {
    signal.confidence_match * WEIGHT_CONFIDENCE
        + signal.health_score * WEIGHT_HEALTH
        + signal.recent_success_rate * WEIGHT_SUCCESS_RATE
}

/// Select the remediator name to use, given per-remediator signals. Ties
/// are broken by lower estimated duration (§4.7).
///
/// Falls back to `manual-k8s` when nothing else qualifies; returns `None`
/// only when `manual-k8s` itself is absent or declines, which the caller
/// maps to `no_remediator` (§7).
pub fn select(signals: &[RemediatorSignal]) -> Option<String> {
    let mut candidates: Vec<&RemediatorSignal> = signals.iter().filter(|s| s.applies).collect();

    if candidates.is_empty() {
        return signals
            .iter()
            .find(|s| s.name == MANUAL_FALLBACK_NAME && s.applies)
            .map(|s| s.name.to_string());
    }

    candidates.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap()
            .then(a.estimated_duration_secs.partial_cmp(&b.estimated_duration_secs).unwrap())
    });

    candidates.first().map(|s| s.name.to_string())
}

/// The remediator name that natively handles `method`, used to decide
/// which applicable candidate gets the detector's full confidence in
/// `select_from_registry` (§4.7).
fn native_remediator(method: &DeploymentMethod) -> &'static str {
    match method {
        DeploymentMethod::Gitops => "gitops-sync",
        DeploymentMethod::Helm => "helm-rollback",
        DeploymentMethod::Operator => "operator-reconcile",
        DeploymentMethod::Manual | DeploymentMethod::Unknown => MANUAL_FALLBACK_NAME,
    }
}

/// Same contract as `select`, sourced from live registry entries instead
/// of pre-extracted signals — the convenience entry point the orchestrator
/// calls at plan time.
pub fn select_from_registry(
    info: &DeploymentInfo,
    remediators: &[Box<dyn Remediator>],
    health_scores: &HashMap<String, f64>,
    success_rates: &HashMap<String, f64>,
) -> Option<String> {
    let native = native_remediator(&info.method);
    let signals: Vec<RemediatorSignal> = remediators
        .iter()
        .map(|r| RemediatorSignal {
            name: r.name(),
            applies: r.applies_to(info),
            confidence_match: if r.name() == native {
                info.confidence
            } else {
                FALLBACK_CONFIDENCE_MATCH
            },
            health_score: *health_scores.get(r.name()).unwrap_or(&1.0),
            recent_success_rate: *success_rates.get(r.name()).unwrap_or(&1.0),
            estimated_duration_secs: r.estimated_duration().as_secs_f64(),
        })
        .collect();
    select(&signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeploymentMethod;
    use chrono::Utc;

    fn info(confidence: f64) -> DeploymentInfo {
        DeploymentInfo {
            namespace: "ns".into(),
            name: "app".into(),
            kind: "Deployment".into(),
            method: DeploymentMethod::Gitops,
            managed_by: None,
            source: None,
            confidence,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn picks_highest_scoring_applicable_remediator() {
        let signals = vec![
            RemediatorSignal {
                name: "gitops-sync",
                applies: true,
                confidence_match: 0.95,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 30.0,
            },
            RemediatorSignal {
                name: "manual-k8s",
                applies: true,
                confidence_match: FALLBACK_CONFIDENCE_MATCH,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 5.0,
            },
        ];
        let chosen = select(&signals).unwrap();
        assert_eq!(chosen, "gitops-sync");
    }

    #[test]
    fn ties_are_broken_by_lower_estimated_duration() {
        let signals = vec![
            RemediatorSignal {
                name: "slow",
                applies: true,
                confidence_match: 0.9,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 60.0,
            },
            RemediatorSignal {
                name: "fast",
                applies: true,
                confidence_match: 0.9,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 10.0,
            },
        ];
        let chosen = select(&signals).unwrap();
        assert_eq!(chosen, "fast");
    }

    #[test]
    fn falls_back_to_manual_when_nothing_applies() {
        let signals = vec![
            RemediatorSignal {
                name: "gitops-sync",
                applies: false,
                confidence_match: 0.6,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 30.0,
            },
            RemediatorSignal {
                name: "manual-k8s",
                applies: true,
                confidence_match: 0.6,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 5.0,
            },
        ];
        let chosen = select(&signals).unwrap();
        assert_eq!(chosen, "manual-k8s");
    }

    #[test]
    fn no_qualifying_remediator_at_all_yields_none() {
        let signals = vec![RemediatorSignal {
            name: "gitops-sync",
            applies: false,
            confidence_match: 0.5,
            health_score: 1.0,
            recent_success_rate: 1.0,
            estimated_duration_secs: 30.0,
        }];
        assert!(select(&signals).is_none());
    }

    #[test]
    fn zero_health_and_success_rate_can_demote_an_otherwise_qualifying_remediator() {
        let signals = vec![
            RemediatorSignal {
                name: "gitops-sync",
                applies: true,
                confidence_match: 0.95,
                health_score: 0.0,
                recent_success_rate: 0.0,
                estimated_duration_secs: 30.0,
            },
            RemediatorSignal {
                name: "manual-k8s",
                applies: true,
                confidence_match: FALLBACK_CONFIDENCE_MATCH,
                health_score: 1.0,
                recent_success_rate: 1.0,
                estimated_duration_secs: 5.0,
            },
        ];
        let chosen = select(&signals).unwrap();
        assert_eq!(chosen, "manual-k8s");
    }

    #[test]
    fn native_remediator_gets_full_detector_confidence_others_get_baseline() {
        let native = native_remediator(&DeploymentMethod::Gitops);
        assert_eq!(native, "gitops-sync");
        assert_eq!(native_remediator(&DeploymentMethod::Helm), "helm-rollback");
        assert_eq!(native_remediator(&DeploymentMethod::Operator), "operator-reconcile");
        assert_eq!(native_remediator(&DeploymentMethod::Manual), MANUAL_FALLBACK_NAME);
        assert_eq!(native_remediator(&DeploymentMethod::Unknown), MANUAL_FALLBACK_NAME);
    }

    /// Minimal `Remediator` test double so `select_from_registry` can be
    /// exercised without a live `KubeFacade` or outbound HTTP client.
    struct FakeRemediator {
        name: &'static str,
        applies: bool,
        duration_secs: u64,
    }

    #[async_trait::async_trait]
    impl Remediator for FakeRemediator {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies_to(&self, _info: &DeploymentInfo) -> bool {
            self.applies
        }

        fn estimated_duration(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.duration_secs)
        }

        async fn execute(
            &self,
            _incident: &crate::domain::Incident,
            _info: &DeploymentInfo,
            _step: &crate::domain::Step,
        ) -> Result<crate::remediators::RemediationOutcome, crate::error::OrchestratorError> {
            unreachable!("not exercised by selector tests")
        }
    }

    #[test]
    fn select_from_registry_prefers_the_method_native_remediator_over_manual_fallback() {
        // Regression: manual-k8s's always-true `applies_to` must not win on
        // duration alone against a genuinely matching, slower strategy
        // (§4.7, §8 scenario 1).
        let remediators: Vec<Box<dyn Remediator>> = vec![
            Box::new(FakeRemediator {
                name: "gitops-sync",
                applies: true,
                duration_secs: 180,
            }),
            Box::new(FakeRemediator {
                name: "manual-k8s",
                applies: true,
                duration_secs: 20,
            }),
        ];
        let chosen = select_from_registry(&info(0.95), &remediators, &HashMap::new(), &HashMap::new());
        assert_eq!(chosen.as_deref(), Some("gitops-sync"));
    }

    #[test]
    fn select_from_registry_falls_back_to_manual_when_native_remediator_is_absent() {
        let remediators: Vec<Box<dyn Remediator>> = vec![Box::new(FakeRemediator {
            name: "manual-k8s",
            applies: true,
            duration_secs: 20,
        })];
        let chosen = select_from_registry(&info(0.95), &remediators, &HashMap::new(), &HashMap::new());
        assert_eq!(chosen.as_deref(), Some("manual-k8s"));
    }

    #[test]
    fn select_from_registry_degrades_unhealthy_native_remediator() {
        let remediators: Vec<Box<dyn Remediator>> = vec![
            Box::new(FakeRemediator {
                name: "gitops-sync",
                applies: true,
                duration_secs: 30,
            }),
            Box::new(FakeRemediator {
                name: "manual-k8s",
                applies: true,
                duration_secs: 20,
            }),
        ];
        let mut health = HashMap::new();
        health.insert("gitops-sync".to_string(), 0.0);
        let chosen = select_from_registry(&info(0.95), &remediators, &health, &HashMap::new());
        assert_eq!(chosen.as_deref(), Some("manual-k8s"));
    }
}
