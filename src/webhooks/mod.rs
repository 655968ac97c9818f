//! Validating admission webhook
//!
//! Decides ALLOW or DENY for CREATE and UPDATE requests using externally
//! configured policy rather than per-kind code:
//! - Required labels per kind
//! - Immutable spec fields per kind, with the service catalog arbitrating
//!   plan changes of cloud services

pub mod admission;
pub mod policies;
mod server;
mod validator;

pub use admission::{
    AdmissionError, AdmissionInput, AdmissionObject, Decision, Dependent, FETCH_FAILED_MESSAGE,
    Operation,
};
pub use server::{
    AdmissionReview, AdmissionReviewResponse, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
pub use validator::AdmissionValidator;
