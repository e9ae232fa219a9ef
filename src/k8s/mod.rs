//! Kubernetes access facade (C1).
//!
//! Uniform typed + dynamic access to cluster resources, grounded on the
//! teacher's `kube`/`k8s-openapi` usage in `commands::reconcile`,
//! `commands::webhook`, and `multi_cluster::client_for_context` — but
//! built as a reusable facade instead of ad hoc `Api::namespaced` calls
//! scattered across command functions.

pub mod owner_ref;
pub mod rate_limit;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod, ResourceQuota, Secret, Service};
use kube::api::{Api, DeleteParams, ListParams, ObjectList, Patch, PatchParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::OrchestratorError;
use rate_limit::RateLimiter;

pub use owner_ref::{first_custom_resource_owner, owner_references, walk_owner_chain, OwnerLink};

/// `kube::Api<T>` wrapped with the facade's `RateLimiter` (§4.1(b)): every
/// `list`/`get`/`patch` call waits for a token before reaching the API
/// server, so a remediator holding one of these (rather than calling back
/// through a facade method) is still throttled.
pub struct RateLimitedApi<T> {
    inner: Api<T>,
    limiter: RateLimiter,
}

impl<T> RateLimitedApi<T>
where
    T: kube::Resource + Clone + DeserializeOwned + std::fmt::Debug,
    T::DynamicType: Default,
{
    pub async fn list(&self, lp: &ListParams) -> kube::Result<ObjectList<T>> {
        self.limiter.acquire().await;
        self.inner.list(lp).await
    }

    pub async fn get(&self, name: &str) -> kube::Result<T> {
        self.limiter.acquire().await;
        self.inner.get(name).await
    }

    pub async fn patch<P>(&self, name: &str, pp: &PatchParams, patch: &Patch<P>) -> kube::Result<T>
    where
        P: Serialize + std::fmt::Debug,
    {
        self.limiter.acquire().await;
        self.inner.patch(name, pp, patch).await
    }
}

/// Thin wrapper over `kube::Client` exposing the typed/dynamic accessors
/// C4-C9 need, with QPS/burst applied at construction (§4.1).
#[derive(Clone)]
pub struct KubeFacade {
    client: Client,
    limiter: RateLimiter,
}

impl KubeFacade {
    /// Build from in-cluster config, falling back to the kubeconfig at
    /// `kubeconfig_path` (or the default kubeconfig search path) when not
    /// running inside a cluster.
    pub async fn connect(
        kubeconfig_path: Option<&str>,
        qps: f32,
        burst: i32,
    ) -> Result<Self, OrchestratorError> {
        let mut config = match Config::incluster() {
            Ok(cfg) => cfg,
            Err(_) => {
                let kubeconfig = match kubeconfig_path {
                    Some(path) => kube::config::Kubeconfig::read_from(path)
                        .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?,
                    None => kube::config::Kubeconfig::read()
                        .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?,
                };
                Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                    .await
                    .map_err(|e| OrchestratorError::BackendUnavailable(e.to_string()))?
            }
        };
        config.accept_invalid_certs = false;

        let client = Client::try_from(config).map_err(OrchestratorError::from)?;

        // kube 0.88's `Config` has no qps/burst fields to populate, so the
        // limit is enforced client-side instead (§4.1(b)): every typed
        // accessor below hands out a `RateLimitedApi<T>` that waits on this
        // same token bucket before issuing a request, so it's enforced
        // wherever remediators act on the facade's handles, not only on
        // calls routed through a dedicated facade method.
        let limiter = RateLimiter::new(qps, burst);

        Ok(Self { client, limiter })
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(20.0, 40),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn verify_connectivity(&self) -> Result<(), OrchestratorError> {
        self.client
            .apiserver_version()
            .await
            .map(|_| ())
            .map_err(OrchestratorError::from)
    }

    /// Startup RBAC capability check (`kubectl auth can-i`-equivalent).
    /// Out of scope for this build — always succeeds — but kept as the
    /// extension point `main` calls before serving traffic, the same way
    /// `commands::webhook::serve` gates startup on `apiserver_version()`.
    pub async fn verify_startup_rbac(&self) -> Result<(), OrchestratorError> {
        Ok(())
    }

    fn wrap<T>(&self, inner: Api<T>) -> RateLimitedApi<T> {
        RateLimitedApi {
            inner,
            limiter: self.limiter.clone(),
        }
    }

    /* ── typed namespaced access ── */

    pub fn pods(&self, namespace: &str) -> RateLimitedApi<Pod> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn deployments(&self, namespace: &str) -> RateLimitedApi<Deployment> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn replica_sets(&self, namespace: &str) -> RateLimitedApi<ReplicaSet> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn stateful_sets(&self, namespace: &str) -> RateLimitedApi<StatefulSet> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn daemon_sets(&self, namespace: &str) -> RateLimitedApi<DaemonSet> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn services(&self, namespace: &str) -> RateLimitedApi<Service> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn events(&self, namespace: &str) -> RateLimitedApi<Event> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn secrets(&self, namespace: &str) -> RateLimitedApi<Secret> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    /* ── typed cluster-scoped access ── */

    pub fn resource_quotas(&self, namespace: &str) -> RateLimitedApi<ResourceQuota> {
        self.wrap(Api::namespaced(self.client.clone(), namespace))
    }

    pub fn nodes(&self) -> RateLimitedApi<Node> {
        self.wrap(Api::all(self.client.clone()))
    }

    pub fn namespaces(&self) -> RateLimitedApi<Namespace> {
        self.wrap(Api::all(self.client.clone()))
    }

    /* ── dynamic access ── */

    fn dynamic(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    pub async fn get_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, OrchestratorError> {
        self.limiter.acquire().await;
        self.dynamic(resource, namespace)
            .get(name)
            .await
            .map_err(OrchestratorError::from)
    }

    pub async fn patch_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, OrchestratorError> {
        self.limiter.acquire().await;
        self.dynamic(resource, namespace)
            .patch(
                name,
                &PatchParams::apply("remediation-orchestrator"),
                &Patch::Merge(patch),
            )
            .await
            .map_err(OrchestratorError::from)
    }

    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), OrchestratorError> {
        self.limiter.acquire().await;
        let raw: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        raw.delete(name, &DeleteParams::default())
            .await
            .map_err(OrchestratorError::from)?;
        Ok(())
    }

    pub async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, OrchestratorError> {
        let list = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(OrchestratorError::from)?;
        Ok(list.items)
    }
}
