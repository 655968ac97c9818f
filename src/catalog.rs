//! Service catalog client
//!
//! Answers a single question for the immutability policy: may the pricing
//! plan of a named cloud service be changed after creation? The catalog is
//! queried once per question with a bounded timeout and no retry. Every
//! failure answers "not updateable" so that immutability stays enforced.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default global catalog endpoint
pub const DEFAULT_CATALOG_URI: &str = "https://globalcatalog.cloud.ibm.com/api/v1";

/// Default timeout for a catalog lookup
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(15);

/// Resource kind the catalog uses for services
const SERVICE_KIND: &str = "service";

/// Decides whether a service's plan may change after creation.
#[async_trait]
pub trait PlanAuthority: Send + Sync {
    /// `true` only when the authority positively confirms the plan is
    /// updateable. Lookup failures answer `false`.
    async fn is_plan_updateable(&self, service_name: &str) -> bool;
}

/// Errors from a catalog lookup. These never leave this module's
/// [`PlanAuthority`] implementation.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned HTTP {0}")]
    Status(u16),

    #[error("malformed catalog response: {0}")]
    Body(#[from] serde_json::Error),
}

/// Catalog listing as returned by a search query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogListing {
    pub count: f64,
    pub next: Option<String>,
    pub resources: Vec<CatalogResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogResource {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub metadata: ResourceMetadata,
    pub overview_ui: OverviewUi,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceMetadata {
    pub service: ServiceMetadata,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub original_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceMetadata {
    pub plan_updateable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewUi {
    pub en: OverviewText,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewText {
    pub display_name: String,
}

/// A catalog service whose plan can be changed in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateableService {
    pub name: String,
    pub display_name: String,
    pub id: String,
}

/// Services in `resources` whose own metadata marks the plan updateable.
pub fn plan_updateable_services(resources: &[CatalogResource]) -> Vec<UpdateableService> {
    resources
        .iter()
        .filter(|r| r.kind == SERVICE_KIND)
        .inspect(|r| {
            debug!(
                name = %r.name,
                id = %r.id,
                display_name = %r.overview_ui.en.display_name,
                plan_updateable = r.metadata.service.plan_updateable,
                "Catalog service entry"
            );
        })
        .filter(|r| r.metadata.service.plan_updateable)
        .map(|r| UpdateableService {
            name: r.name.clone(),
            display_name: r.overview_ui.en.display_name.clone(),
            id: r.id.clone(),
        })
        .collect()
}

/// HTTP client for the global catalog search endpoint
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_uri: String,
}

impl CatalogClient {
    pub fn new(base_uri: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, base_uri))
    }

    /// Use a preconfigured HTTP client. The client's timeout bounds lookups.
    pub fn with_http(http: reqwest::Client, base_uri: impl Into<String>) -> Self {
        Self {
            http,
            base_uri: base_uri.into(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Search the catalog for `service_name`: `GET <base>?q=<name>`.
    pub async fn search(&self, service_name: &str) -> Result<CatalogListing, CatalogError> {
        info!(uri = %self.base_uri, service = %service_name, "Querying service catalog");
        let response = self
            .http
            .get(&self.base_uri)
            .query(&[("q", service_name)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PlanAuthority for CatalogClient {
    async fn is_plan_updateable(&self, service_name: &str) -> bool {
        match self.search(service_name).await {
            Ok(listing) => {
                let updateable = plan_updateable_services(&listing.resources);
                debug!(service = %service_name, matches = updateable.len(), "Catalog lookup complete");
                !updateable.is_empty()
            }
            Err(e) => {
                warn!(service = %service_name, error = %e, "Catalog lookup failed, treating plan as not updateable");
                false
            }
        }
    }
}
