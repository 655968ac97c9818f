//! Admission webhook policies
//!
//! - labels: required label keys per kind (CREATE and UPDATE)
//! - immutability: configured spec paths may not change on UPDATE

pub mod immutability;
pub mod labels;

pub use immutability::{PLAN_FIELD, SERVICE_CLASS_FIELD, validate_immutables};
pub use labels::validate_labels;
