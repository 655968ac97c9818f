//! Webhook HTTP server handlers
//!
//! Bridges the `admission.k8s.io/v1` AdmissionReview envelope to the
//! [`AdmissionValidator`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::admission::{AdmissionInput, Operation};
use super::validator::AdmissionValidator;
use crate::health::HealthState;

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub operation: Operation,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// AdmissionReview response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: i32,
    pub message: String,
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub validator: AdmissionValidator,
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(validator: AdmissionValidator, health: Option<Arc<HealthState>>) -> Self {
        Self { validator, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate_admission))
        .with_state(state)
}

/// Validating admission webhook handler
pub(crate) async fn validate_admission(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    let request = match review.request {
        Some(req) => req,
        None => {
            error!("Admission review missing request");
            return (
                StatusCode::BAD_REQUEST,
                Json(create_response("", false, "Missing request in AdmissionReview")),
            );
        }
    };

    let uid = request.uid.clone();
    info!(
        uid = %uid,
        operation = ?request.operation,
        kind = %request.kind.kind,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    // Only CREATE and UPDATE carry policy
    if !matches!(request.operation, Operation::Create | Operation::Update) {
        return (StatusCode::OK, Json(create_response(&uid, true, "")));
    }

    let Some(object) = request.object else {
        return (
            StatusCode::OK,
            Json(create_response(&uid, false, "Missing object in request")),
        );
    };

    let input = AdmissionInput {
        operation: request.operation,
        kind: request.kind.kind,
        group: request.kind.group,
        version: request.kind.version,
        namespace: request.namespace,
        name: request.name,
        object,
    };

    let started = Instant::now();
    let decision = state.validator.validate(&input).await;
    if let Some(health) = &state.health {
        health.metrics.record_decision(
            &input.kind,
            decision.allowed,
            started.elapsed().as_secs_f64(),
        );
    }

    if decision.allowed {
        info!(uid = %uid, "Admission request allowed");
    } else {
        warn!(uid = %uid, message = %decision.message, "Admission request denied");
    }
    (
        StatusCode::OK,
        Json(create_response(&uid, decision.allowed, &decision.message)),
    )
}

/// Create an AdmissionReview response
fn create_response(uid: &str, allowed: bool, message: &str) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed,
            status: if allowed {
                None
            } else {
                Some(AdmissionStatus {
                    code: 403,
                    message: message.to_string(),
                })
            },
        },
    }
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<port>` and serves the /validate endpoint.
/// TLS certificates are loaded from the PEM files given.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(String),
}
