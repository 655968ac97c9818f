pub mod catalog;
pub mod cluster;
pub mod config;
pub mod health;
pub mod policy;
pub mod webhooks;

pub use catalog::{CatalogClient, PlanAuthority};
pub use cluster::{KubeResourceFetcher, ResourceFetcher, ResourceKey};
pub use config::{Config, Enforcement};
pub use health::{HealthState, Metrics};
pub use policy::{ConfigError, PolicyPaths, PolicyStore};
pub use webhooks::{
    AdmissionInput, AdmissionValidator, Decision, WebhookError, WebhookState, run_webhook_server,
};

use std::sync::Arc;

use kube::Client;

/// Build the validator from configuration.
///
/// Policies are loaded once, failing open per dimension. The loaded rule
/// counts are published to `health` when given.
pub fn build_validator(
    config: &Config,
    client: Client,
    health: Option<&HealthState>,
) -> Result<AdmissionValidator, catalog::CatalogError> {
    let policies = PolicyStore::load(&config.policy_paths);
    if let Some(health) = health {
        let (labels, immutables, exclusives) = policies.rule_counts();
        health.metrics.set_policy_rules("labels", labels as i64);
        health.metrics.set_policy_rules("immutables", immutables as i64);
        health.metrics.set_policy_rules("exclusives", exclusives as i64);
    }

    let catalog = CatalogClient::new(config.catalog_uri.clone(), config.catalog_timeout)?;
    tracing::info!(uri = %catalog.base_uri(), "Service catalog client configured");

    Ok(AdmissionValidator::new(
        Arc::new(policies),
        config.enforcement,
        Arc::new(KubeResourceFetcher::new(client)),
        Arc::new(catalog),
    ))
}
