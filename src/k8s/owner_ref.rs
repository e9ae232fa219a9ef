//! Owner-reference walk helper, generalized from the teacher's
//! `enforcement::resolve_owner` (which stops at the first
//! Deployment/StatefulSet/DaemonSet owner) into the bounded-depth,
//! cycle-safe walk needed by the deployment detector (C4).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, ObjectMeta};
use std::collections::HashSet;

/// Kinds the cluster itself ships controllers for. Any owner kind outside
/// this set is treated as a custom resource (§4.4 rule 4).
pub const BUILTIN_KINDS: &[&str] = &[
    "Pod",
    "Deployment",
    "ReplicaSet",
    "StatefulSet",
    "DaemonSet",
    "Job",
    "CronJob",
    "Service",
    "ConfigMap",
    "Secret",
];

pub fn is_builtin_kind(kind: &str) -> bool {
    BUILTIN_KINDS.contains(&kind)
}

/// Maximum owner-chain depth walked before giving up, guarding against
/// cycles in a malformed cluster (§9 design notes).
pub const MAX_WALK_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerLink {
    pub kind: String,
    pub name: String,
}

/// A resource identity the walk can resolve further owners for. Kept
/// abstract over the actual lookup so this stays unit-testable without a
/// cluster: callers supply a `lookup` closure mapping `(kind, name) ->
/// Option<owner_references>`.
pub fn walk_owner_chain<F>(start_owners: &[OwnerReference], lookup: F) -> Vec<OwnerLink>
where
    F: Fn(&str, &str) -> Option<Vec<OwnerReference>>,
{
    let mut chain = Vec::new();
    let mut visited: HashSet<(String, String)> = HashSet::new();
    let mut frontier: Vec<OwnerReference> = start_owners.to_vec();

    for _ in 0..MAX_WALK_DEPTH {
        let Some(owner) = frontier.first().cloned() else {
            break;
        };
        let key = (owner.kind.clone(), owner.name.clone());
        if !visited.insert(key) {
            break;
        }
        chain.push(OwnerLink {
            kind: owner.kind.clone(),
            name: owner.name.clone(),
        });

        match lookup(&owner.kind, &owner.name) {
            Some(next_owners) if !next_owners.is_empty() => frontier = next_owners,
            _ => break,
        }
    }

    chain
}

/// The first non-built-in kind found in an owner chain, if any (§4.4 rule 4).
pub fn first_custom_resource_owner(chain: &[OwnerLink]) -> Option<&OwnerLink> {
    chain.iter().find(|link| !is_builtin_kind(&link.kind))
}

/// Direct owner references recorded on an object's metadata, or an empty
/// slice if none are set.
pub fn owner_references(meta: &ObjectMeta) -> &[OwnerReference] {
    meta.owner_references.as_deref().unwrap_or(&[])
}
