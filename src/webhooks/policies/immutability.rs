//! Immutable field policy
//!
//! - Configured spec paths cannot change on UPDATE
//! - `spec.plan` of a `service` may change when the service catalog reports
//!   the stored service class as plan-updateable
//!
//! The stored object is always fetched from the cluster; without a baseline
//! the update is denied.

use tracing::{debug, info, warn};

use crate::catalog::PlanAuthority;
use crate::cluster::{ResourceFetcher, ResourceKey};
use crate::policy::flatten::display_string;
use crate::policy::{FlattenedSpec, PolicyStore, canonical_string, flatten};
use crate::webhooks::admission::{AdmissionError, AdmissionObject, Decision};

/// Flattened path of a service's pricing plan
pub const PLAN_FIELD: &str = "spec.plan";
/// Flattened path of the catalog service a plan belongs to
pub const SERVICE_CLASS_FIELD: &str = "spec.serviceclass";

/// Kind whose plan changes are arbitrated by the catalog (case-insensitive)
const SERVICE_KIND: &str = "service";

/// Compare the configured immutable fields of `object` against the stored
/// version.
///
/// Every changed field is reported; one clause `"<path> is immutable. "` is
/// appended per violation.
pub async fn validate_immutables(
    policies: &PolicyStore,
    object: &AdmissionObject,
    fetcher: &dyn ResourceFetcher,
    authority: &dyn PlanAuthority,
) -> Result<Decision, AdmissionError> {
    let immutables = policies.immutable_fields(&object.kind);
    if immutables.is_empty() {
        debug!(kind = %object.kind, "No immutable fields configured");
        return Ok(Decision::allowed());
    }
    debug!(kind = %object.kind, immutables = ?immutables, "Checking immutable fields");

    let (group, version) = object.api_group_version()?;
    let spec = flatten_spec(object.spec());
    let key = ResourceKey::new(
        group,
        version,
        &object.kind,
        &object.namespace,
        &object.name,
    );
    let stored = fetcher.fetch(&key).await.map_err(|e| {
        warn!(resource = %key, error = %e, "Failed to fetch stored resource");
        AdmissionError::ResourceFetch(e.to_string())
    })?;
    let stored_spec = flatten_spec(stored.get("spec"));

    let mut message = String::new();
    for field in immutables {
        let path = field.to_lowercase();
        let old = canonical_string(stored_spec.get(&path));
        let new = canonical_string(spec.get(&path));
        if old == new {
            continue;
        }

        if path == PLAN_FIELD
            && object.kind.eq_ignore_ascii_case(SERVICE_KIND)
            && plan_change_permitted(&stored_spec, authority).await
        {
            info!(name = %object.name, old = %old, new = %new, "Plan change permitted by service catalog");
            continue;
        }

        info!(field = %path, old = %old, new = %new, "Rejecting change to immutable field");
        message.push_str(&path);
        message.push_str(" is immutable. ");
    }

    if message.is_empty() {
        Ok(Decision::allowed())
    } else {
        info!(kind = %object.kind, name = %object.name, message = %message, "Immutable field changes rejected");
        Ok(Decision::denied(message))
    }
}

fn flatten_spec(spec: Option<&serde_json::Value>) -> FlattenedSpec {
    spec.map(|s| flatten("spec", s)).unwrap_or_default()
}

/// Ask the catalog about the stored service class. A stored object without
/// a service class cannot be verified and keeps the plan immutable.
async fn plan_change_permitted(stored_spec: &FlattenedSpec, authority: &dyn PlanAuthority) -> bool {
    match stored_spec.get(SERVICE_CLASS_FIELD) {
        Some(class) if !class.is_null() => {
            authority.is_plan_updateable(&display_string(class)).await
        }
        _ => {
            warn!("Stored service has no service class, plan stays immutable");
            false
        }
    }
}
