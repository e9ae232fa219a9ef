//! Deployment detector (C4).
//!
//! Infers how a resource was deployed from its metadata and owner chain,
//! generalizing the teacher's `enforcement::resolve_owner` /
//! `is_protected_namespace` annotation-scanning idiom into the five-rule
//! confidence ladder of SPEC_FULL.md §4.4.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::cache::TtlCache;
use crate::domain::{DeploymentInfo, DeploymentMethod};
use crate::k8s::owner_ref::{first_custom_resource_owner, owner_references, OwnerLink};

pub const GITOPS_ANNOTATION: &str = "gitops-tracking-id";
pub const HELM_ANNOTATION: &str = "helm-release-name";
pub const MANAGED_BY_LABEL: &str = "managed-by";

const CONFIDENCE_GITOPS: f64 = 0.95;
const CONFIDENCE_HELM: f64 = 0.90;
const CONFIDENCE_OPERATOR_LABEL: f64 = 0.80;
const CONFIDENCE_OPERATOR_OWNER: f64 = 0.75;
const CONFIDENCE_MANUAL: f64 = 0.60;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionInput<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
    pub metadata: &'a ObjectMeta,
    /// Owner chain already resolved by `k8s::owner_ref::walk_owner_chain`.
    /// Kept as a plain parameter so detection stays a pure function.
    pub owner_chain: &'a [OwnerLink],
}

/// Pure rule evaluation, no caching, no clock — the five-rule ladder of
/// §4.4 in strict precedence order.
pub fn classify(input: &DetectionInput) -> (DeploymentMethod, f64, Option<String>, Option<String>) {
    let annotations = input.metadata.annotations.clone().unwrap_or_default();
    let labels = input.metadata.labels.clone().unwrap_or_default();

    if let Some(source) = annotations.get(GITOPS_ANNOTATION) {
        return (
            DeploymentMethod::Gitops,
            CONFIDENCE_GITOPS,
            None,
            Some(source.clone()),
        );
    }

    if let Some(release) = annotations.get(HELM_ANNOTATION) {
        return (
            DeploymentMethod::Helm,
            CONFIDENCE_HELM,
            Some(release.clone()),
            None,
        );
    }

    if let Some(managed_by) = labels.get(MANAGED_BY_LABEL) {
        if managed_by != "Helm" {
            return (
                DeploymentMethod::Operator,
                CONFIDENCE_OPERATOR_LABEL,
                Some(managed_by.clone()),
                None,
            );
        }
    }

    if let Some(cr) = first_custom_resource_owner(input.owner_chain) {
        return (
            DeploymentMethod::Operator,
            CONFIDENCE_OPERATOR_OWNER,
            Some(format!("{}/{}", cr.kind, cr.name)),
            None,
        );
    }

    (DeploymentMethod::Manual, CONFIDENCE_MANUAL, None, None)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    namespace: String,
    kind: String,
    name: String,
}

/// Stateful detector: wraps `classify` with the identity-keyed TTL cache
/// and explicit post-remediation invalidation required by §3/§4.4.
pub struct DeploymentDetector {
    cache: Arc<TtlCache<CacheKey, DeploymentInfo>>,
}

impl DeploymentDetector {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(ttl)),
        }
    }

    pub async fn detect(&self, input: &DetectionInput<'_>) -> DeploymentInfo {
        let key = CacheKey {
            namespace: input.namespace.to_string(),
            kind: input.kind.to_string(),
            name: input.name.to_string(),
        };

        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let (method, confidence, managed_by, source) = classify(input);
        let info = DeploymentInfo {
            namespace: input.namespace.to_string(),
            name: input.name.to_string(),
            kind: input.kind.to_string(),
            method,
            managed_by,
            source,
            confidence,
            detected_at: Utc::now(),
        };

        self.cache.put(key, info.clone()).await;
        info
    }

    /// Invalidate the cached detection for an identity after a successful
    /// remediation (§4.4).
    pub async fn invalidate(&self, namespace: &str, kind: &str, name: &str) {
        let key = CacheKey {
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
        };
        self.cache.invalidate(&key).await;
    }
}

impl Default for DeploymentDetector {
    fn default() -> Self {
        Self::new()
    }
}
