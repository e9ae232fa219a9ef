//! Layer classifier (C5).
//!
//! Maps an incident's resource kind and issue type to the ordered set of
//! affected layers, in the same terse range-match style as the teacher's
//! `governance::classify_health`.

use crate::domain::{Incident, Layer};

const INFRA_KINDS: &[&str] = &["Node", "MachineConfig", "MachineConfigPool"];
const PLATFORM_KINDS: &[&str] = &["ClusterOperator", "Operator", "CatalogSource", "Subscription"];

const MULTI_LAYER_ISSUE_TYPES: &[(&str, &[Layer])] = &[(
    "node_pressure_crash_loop",
    &[Layer::Infrastructure, Layer::Application],
)];

/// Ordered, deduplicated subset of {infrastructure, platform, application}
/// affected by an incident (§4.5).
pub fn affected_layers(incident: &Incident) -> Vec<Layer> {
    if let Some((_, layers)) = MULTI_LAYER_ISSUE_TYPES
        .iter()
        .find(|(issue_type, _)| *issue_type == incident.issue.issue_type)
    {
        return layers.to_vec();
    }

    let kind = incident.resource.kind.as_str();
    if INFRA_KINDS.contains(&kind) {
        return vec![Layer::Infrastructure];
    }
    if PLATFORM_KINDS.contains(&kind) {
        return vec![Layer::Platform];
    }

    vec![Layer::Application]
}
