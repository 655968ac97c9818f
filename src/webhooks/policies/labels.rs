//! Required label policy
//!
//! Only presence is checked; label values are not inspected.

use tracing::{debug, info};

use crate::policy::PolicyStore;
use crate::webhooks::admission::{AdmissionObject, Decision};

/// Deny if any label configured for the object's kind is missing.
///
/// Reports the first missing key in configured order. A kind without a
/// rule has no requirement.
pub fn validate_labels(policies: &PolicyStore, object: &AdmissionObject) -> Decision {
    let required = policies.required_labels(&object.kind);
    debug!(
        kind = %object.kind,
        required = ?required,
        available = ?object.labels.keys().collect::<Vec<_>>(),
        "Checking required labels"
    );

    match required.iter().find(|key| !object.labels.contains_key(key.as_str())) {
        Some(missing) => {
            info!(kind = %object.kind, name = %object.name, label = %missing, "Required label missing");
            Decision::denied(format!("required labels are not set: {}", missing))
        }
        None => Decision::allowed(),
    }
}
