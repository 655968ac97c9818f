//! Admission request and decision types
//!
//! [`AdmissionInput`] is what the HTTP layer hands to the validator;
//! [`AdmissionObject`] is the minimal, checked view of the submitted object
//! that the policies work on; [`Decision`] is the only thing that leaves the
//! validator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use kube::core::admission::Operation;

use crate::policy::flatten::{get_path, get_str};

/// Message returned when the stored baseline of an UPDATE cannot be read
pub const FETCH_FAILED_MESSAGE: &str = "failed to retrieve the existing resource";

/// A single admission request as seen by the validator
#[derive(Debug, Clone)]
pub struct AdmissionInput {
    pub operation: Operation,
    pub kind: String,
    pub group: String,
    pub version: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// The submitted object, as raw JSON
    pub object: Value,
}

/// Checked view of the submitted object
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionObject {
    pub kind: String,
    pub group: String,
    pub version: String,
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// The full submitted document
    pub raw: Value,
}

impl AdmissionObject {
    /// Build the checked view from a request.
    ///
    /// Name and namespace come from the object's metadata, falling back to
    /// the request attributes. Labels must be a string map when present.
    pub fn parse(input: &AdmissionInput) -> Result<Self, AdmissionError> {
        let Value::Object(_) = &input.object else {
            return Err(AdmissionError::MalformedRequest(
                "admission object is not a JSON object".to_string(),
            ));
        };

        let metadata = match input.object.get("metadata") {
            None | Some(Value::Null) => None,
            Some(Value::Object(_)) => input.object.get("metadata"),
            Some(_) => {
                return Err(AdmissionError::MalformedRequest(
                    "metadata is not an object".to_string(),
                ));
            }
        };

        let labels = match metadata.and_then(|m| m.get("labels")) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(labels) => BTreeMap::<String, String>::deserialize(labels).map_err(|e| {
                AdmissionError::MalformedRequest(format!("invalid metadata.labels: {}", e))
            })?,
        };

        let name = get_str(&input.object, &["metadata", "name"])
            .map(str::to_string)
            .or_else(|| input.name.clone())
            .unwrap_or_default();
        let namespace = get_str(&input.object, &["metadata", "namespace"])
            .map(str::to_string)
            .or_else(|| input.namespace.clone())
            .unwrap_or_default();

        Ok(Self {
            kind: input.kind.clone(),
            group: input.group.clone(),
            version: input.version.clone(),
            namespace,
            name,
            labels,
            raw: input.object.clone(),
        })
    }

    /// The object's `apiVersion` split into `(group, version)`.
    ///
    /// A document without a `group/version` separator is malformed.
    pub fn api_group_version(&self) -> Result<(String, String), AdmissionError> {
        let api_version = get_str(&self.raw, &["apiVersion"]).ok_or_else(|| {
            AdmissionError::MalformedRequest("apiVersion is missing or not a string".to_string())
        })?;
        split_api_version(api_version)
    }

    /// The `spec` sub-document, if any
    pub fn spec(&self) -> Option<&Value> {
        get_path(&self.raw, &["spec"])
    }
}

/// Split `group/version`. Versions without a group are rejected.
pub fn split_api_version(api_version: &str) -> Result<(String, String), AdmissionError> {
    match api_version.split_once('/') {
        Some((group, version)) => Ok((group.to_string(), version.to_string())),
        None => Err(AdmissionError::MalformedRequest(format!(
            "apiVersion {:?} is not of the form group/version",
            api_version
        ))),
    }
}

/// A resource referenced by another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependent {
    pub kind: String,
    pub name: String,
}

impl Dependent {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Outcome of validating one admission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    /// Empty when allowed
    pub message: String,
}

impl Decision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            message: String::new(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
        }
    }
}

/// Failures inside the validator. They are converted to a denial and never
/// cross the decision boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("failed to retrieve the existing resource: {0}")]
    ResourceFetch(String),
}

impl From<AdmissionError> for Decision {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::MalformedRequest(msg) => Decision::denied(msg),
            AdmissionError::ResourceFetch(_) => Decision::denied(FETCH_FAILED_MESSAGE),
        }
    }
}
