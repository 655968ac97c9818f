//! Externally configured admission policy
//!
//! Three independent rule dimensions are loaded from mounted documents at
//! startup: required labels, immutable spec fields and mutually exclusive
//! field groups. The store is read-only once built and shared between
//! concurrent admission requests.

mod error;
pub mod flatten;
mod store;

pub use error::ConfigError;
pub use flatten::{FlattenedSpec, canonical_string, flatten};
pub use store::{
    ExclusivesConfig, ImmutablesConfig, LabelsConfig, PolicyPaths, PolicyStore,
    DEFAULT_EXCLUSIVES_CONFIG_PATH, DEFAULT_IMMUTABLES_CONFIG_PATH, DEFAULT_LABELS_CONFIG_PATH,
};
