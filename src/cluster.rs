//! Access to the persisted versions of cluster resources
//!
//! Immutability checks compare an UPDATE against what is currently stored,
//! so the stored object is fetched by group/version/kind and name. Kinds are
//! resolved through API discovery since the policy documents may name any
//! custom resource. Discovery runs once per kind; later fetches of the same
//! kind cost a single API call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use kube::discovery::{self, ApiCapabilities, Scope};
use kube::Client;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::webhooks::Dependent;

/// Identity of a namespaced (or cluster-scoped, with an empty namespace)
/// resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let api_version = if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        };
        if self.namespace.is_empty() {
            write!(f, "{} {} {}", api_version, self.kind, self.name)
        } else {
            write!(f, "{} {} {}/{}", api_version, self.kind, self.namespace, self.name)
        }
    }
}

#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Retrieves the currently persisted version of a resource as raw JSON.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, FetchError>;
}

type KindKey = (String, String, String);

/// Discovery results by group/version/kind
#[derive(Default)]
pub struct KindCache {
    kinds: RwLock<HashMap<KindKey, (ApiResource, ApiCapabilities)>>,
}

impl KindCache {
    fn key(gvk: &GroupVersionKind) -> KindKey {
        (gvk.group.clone(), gvk.version.clone(), gvk.kind.clone())
    }

    pub async fn get(&self, gvk: &GroupVersionKind) -> Option<(ApiResource, ApiCapabilities)> {
        self.kinds.read().await.get(&Self::key(gvk)).cloned()
    }

    pub async fn insert(&self, gvk: &GroupVersionKind, resolved: (ApiResource, ApiCapabilities)) {
        self.kinds.write().await.insert(Self::key(gvk), resolved);
    }

    pub async fn resolved_kinds(&self) -> usize {
        self.kinds.read().await.len()
    }
}

/// [`ResourceFetcher`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceFetcher {
    client: Client,
    kinds: Arc<KindCache>,
}

impl KubeResourceFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            kinds: Arc::new(KindCache::default()),
        }
    }

    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, ApiCapabilities), FetchError> {
        if let Some(resolved) = self.kinds.get(gvk).await {
            return Ok(resolved);
        }
        let resolved = discovery::pinned_kind(&self.client, gvk).await?;
        debug!(group = %gvk.group, version = %gvk.version, kind = %gvk.kind, "Resolved kind through discovery");
        self.kinds.insert(gvk, resolved.clone()).await;
        Ok(resolved)
    }
}

#[async_trait]
impl ResourceFetcher for KubeResourceFetcher {
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, FetchError> {
        let gvk = GroupVersionKind::gvk(&key.group, &key.version, &key.kind);
        let (resource, capabilities) = self.resolve(&gvk).await?;

        let api: Api<DynamicObject> = match capabilities.scope {
            Scope::Namespaced if !key.namespace.is_empty() => {
                Api::namespaced_with(self.client.clone(), &key.namespace, &resource)
            }
            Scope::Namespaced => Api::default_namespaced_with(self.client.clone(), &resource),
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
        };

        match api.get_opt(&key.name).await? {
            Some(obj) => {
                debug!(resource = %key, "Fetched stored resource");
                Ok(serde_json::to_value(obj)?)
            }
            None => Err(FetchError::NotFound(key.to_string())),
        }
    }
}

/// Return the dependents of a resource that do not exist in `namespace`.
///
/// Dependents are looked up as core `v1` kinds. Any fetch failure counts as
/// not found. Order of `dependents` is preserved.
pub async fn check_existence(
    fetcher: &dyn ResourceFetcher,
    namespace: &str,
    dependents: &[Dependent],
) -> Vec<Dependent> {
    info!(namespace = %namespace, count = dependents.len(), "Checking dependency existence");
    let mut not_found = Vec::new();
    for dependent in dependents {
        let key = ResourceKey::new("", "v1", &dependent.kind, namespace, &dependent.name);
        if let Err(e) = fetcher.fetch(&key).await {
            warn!(dependent = %key, error = %e, "Dependency not found");
            not_found.push(dependent.clone());
        }
    }
    not_found
}
