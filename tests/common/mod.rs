use std::collections::BTreeMap;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use uuid::Uuid;

use remediation_orchestrator::domain::{
    DeploymentInfo, DeploymentMethod, Incident, Issue, ResourceRef, Severity,
};

pub fn object_meta(annotations: &[(&str, &str)], labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        annotations: Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        labels: Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

pub fn owner_ref(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        kind: kind.to_string(),
        name: name.to_string(),
        api_version: "v1".to_string(),
        uid: "test-uid".to_string(),
        controller: Some(true),
        block_owner_deletion: None,
    }
}

pub fn make_incident(namespace: &str, kind: &str, name: &str, issue_type: &str, severity: Severity) -> Incident {
    Incident {
        id: Uuid::new_v4(),
        namespace: namespace.to_string(),
        resource: ResourceRef {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        issue: Issue {
            issue_type: issue_type.to_string(),
            description: format!("{issue_type} detected on {namespace}/{kind}/{name}"),
            severity,
        },
        created_at: Utc::now(),
    }
}

pub fn make_deployment_info(
    namespace: &str,
    name: &str,
    kind: &str,
    method: DeploymentMethod,
    confidence: f64,
) -> DeploymentInfo {
    DeploymentInfo {
        namespace: namespace.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
        method,
        managed_by: None,
        source: None,
        confidence,
        detected_at: Utc::now(),
    }
}
