//! Test fixtures for admission validation
//!
//! Provides in-memory stand-ins for the cluster and the service catalog,
//! plus builders for policy stores and admission requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use admission_control::catalog::PlanAuthority;
use admission_control::cluster::{FetchError, ResourceFetcher, ResourceKey};
use admission_control::policy::{ImmutablesConfig, LabelsConfig, PolicyStore};
use admission_control::webhooks::{AdmissionInput, Operation};
use admission_control::{AdmissionValidator, Enforcement};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const GROUP: &str = "ibmcloud.ibm.com";
pub const VERSION: &str = "v1alpha1";
pub const NAMESPACE: &str = "default";

// =============================================================================
// Fake cluster
// =============================================================================

/// Cluster holding a fixed set of stored objects. Records every fetch.
#[derive(Default)]
pub struct FakeCluster {
    objects: HashMap<ResourceKey, Value>,
    pub fetches: Mutex<Vec<ResourceKey>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object with `spec` under `kind`/`name` in the default namespace
    pub fn with_stored(mut self, kind: &str, name: &str, spec: Value) -> Self {
        let key = ResourceKey::new(GROUP, VERSION, kind, NAMESPACE, name);
        self.objects.insert(key, stored_object(kind, name, spec));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ResourceFetcher for FakeCluster {
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, FetchError> {
        self.fetches.lock().unwrap().push(key.clone());
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(key.to_string()))
    }
}

// =============================================================================
// Fake catalog
// =============================================================================

/// Catalog answering from a fixed table; unknown services are not updateable.
#[derive(Default)]
pub struct FakeCatalog {
    updateable: HashMap<String, bool>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: &str, plan_updateable: bool) -> Self {
        self.updateable.insert(name.to_string(), plan_updateable);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl PlanAuthority for FakeCatalog {
    async fn is_plan_updateable(&self, service_name: &str) -> bool {
        self.lookups.lock().unwrap().push(service_name.to_string());
        self.updateable.get(service_name).copied().unwrap_or(false)
    }
}

// =============================================================================
// Policies
// =============================================================================

pub fn labels_rule(kind: &str, labels: &[&str]) -> LabelsConfig {
    LabelsConfig {
        kind: kind.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

pub fn immutables_rule(kind: &str, fields: &[&str]) -> ImmutablesConfig {
    ImmutablesConfig {
        kind: kind.to_string(),
        immutables: fields.iter().map(|f| f.to_string()).collect(),
    }
}

pub fn policies(labels: Vec<LabelsConfig>, immutables: Vec<ImmutablesConfig>) -> PolicyStore {
    PolicyStore::new(labels, immutables, vec![])
}

pub fn validator(
    policies: PolicyStore,
    cluster: Arc<FakeCluster>,
    catalog: Arc<FakeCatalog>,
) -> AdmissionValidator {
    AdmissionValidator::new(Arc::new(policies), Enforcement::all(), cluster, catalog)
}

// =============================================================================
// Requests
// =============================================================================

/// A stored object as the cluster would return it
pub fn stored_object(kind: &str, name: &str, spec: Value) -> Value {
    json!({
        "apiVersion": format!("{}/{}", GROUP, VERSION),
        "kind": kind,
        "metadata": { "name": name, "namespace": NAMESPACE, "resourceVersion": "1" },
        "spec": spec,
    })
}

/// Build an admission request for `kind`/`name` with the given labels and spec
pub fn request(
    operation: Operation,
    kind: &str,
    name: &str,
    labels: &[(&str, &str)],
    spec: Value,
) -> AdmissionInput {
    let labels: serde_json::Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    AdmissionInput {
        operation,
        kind: kind.to_string(),
        group: GROUP.to_string(),
        version: VERSION.to_string(),
        namespace: Some(NAMESPACE.to_string()),
        name: Some(name.to_string()),
        object: json!({
            "apiVersion": format!("{}/{}", GROUP, VERSION),
            "kind": kind,
            "metadata": { "name": name, "namespace": NAMESPACE, "labels": labels },
            "spec": spec,
        }),
    }
}

pub fn update(kind: &str, name: &str, spec: Value) -> AdmissionInput {
    request(Operation::Update, kind, name, &[], spec)
}

pub fn create(kind: &str, name: &str, labels: &[(&str, &str)], spec: Value) -> AdmissionInput {
    request(Operation::Create, kind, name, labels, spec)
}
