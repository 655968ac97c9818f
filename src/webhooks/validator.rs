//! Validation pipeline
//!
//! One pass per request, no backtracking:
//!
//! ```text
//! parse -> labels (if enabled) -> immutables (UPDATE, if enabled) -> allowed
//!            \__ denied             \__ denied
//! ```
//!
//! Outbound calls (stored object fetch, catalog lookup) are awaited one
//! after the other and never retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::admission::{AdmissionInput, AdmissionObject, Decision, Operation};
use super::policies::{validate_immutables, validate_labels};
use crate::catalog::PlanAuthority;
use crate::cluster::ResourceFetcher;
use crate::config::Enforcement;
use crate::policy::PolicyStore;

/// Validates admission requests against the loaded policies
#[derive(Clone)]
pub struct AdmissionValidator {
    policies: Arc<PolicyStore>,
    enforcement: Enforcement,
    fetcher: Arc<dyn ResourceFetcher>,
    authority: Arc<dyn PlanAuthority>,
}

impl AdmissionValidator {
    pub fn new(
        policies: Arc<PolicyStore>,
        enforcement: Enforcement,
        fetcher: Arc<dyn ResourceFetcher>,
        authority: Arc<dyn PlanAuthority>,
    ) -> Self {
        Self {
            policies,
            enforcement,
            fetcher,
            authority,
        }
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    /// Decide a single admission request.
    pub async fn validate(&self, input: &AdmissionInput) -> Decision {
        let object = match AdmissionObject::parse(input) {
            Ok(object) => object,
            Err(e) => {
                warn!(error = %e, "Failed to parse admission object");
                return e.into();
            }
        };

        info!(
            operation = ?input.operation,
            kind = %object.kind,
            group = %object.group,
            version = %object.version,
            namespace = %object.namespace,
            name = %object.name,
            labels = ?object.labels,
            "Validating admission request"
        );

        if self.enforcement.labels {
            let decision = validate_labels(&self.policies, &object);
            if !decision.allowed {
                return decision;
            }
        }

        if matches!(input.operation, Operation::Update) && self.enforcement.immutables {
            let decision = validate_immutables(
                &self.policies,
                &object,
                self.fetcher.as_ref(),
                self.authority.as_ref(),
            )
            .await
            .unwrap_or_else(Decision::from);
            if !decision.allowed {
                return decision;
            }
        }

        debug!(kind = %object.kind, name = %object.name, "Admission request approved");
        Decision::allowed()
    }
}
