//! Policy documents and the in-memory policy store

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::ConfigError;

/// Default mount path of the required labels document
pub const DEFAULT_LABELS_CONFIG_PATH: &str = "/etc/config/validation/labels";
/// Default mount path of the immutable fields document
pub const DEFAULT_IMMUTABLES_CONFIG_PATH: &str = "/etc/config/validation/immutables";
/// Default mount path of the mutually exclusive fields document
pub const DEFAULT_EXCLUSIVES_CONFIG_PATH: &str = "/etc/config/validation/exclusives";

/// Required labels for a resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Immutable spec field paths for a resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutablesConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub immutables: Vec<String>,
}

/// Mutually exclusive field groups for a kind in a given API group/version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusivesConfig {
    pub kind: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusives: Vec<Vec<String>>,
}

/// Locations of the three policy documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyPaths {
    pub labels: PathBuf,
    pub immutables: PathBuf,
    pub exclusives: PathBuf,
}

impl Default for PolicyPaths {
    fn default() -> Self {
        Self {
            labels: PathBuf::from(DEFAULT_LABELS_CONFIG_PATH),
            immutables: PathBuf::from(DEFAULT_IMMUTABLES_CONFIG_PATH),
            exclusives: PathBuf::from(DEFAULT_EXCLUSIVES_CONFIG_PATH),
        }
    }
}

/// Read-only rule sets consulted by the validation pipeline.
///
/// Entries keep their document order. When a kind appears more than once in
/// a dimension only the first entry is consulted.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    labels: Vec<LabelsConfig>,
    immutables: Vec<ImmutablesConfig>,
    exclusives: Vec<ExclusivesConfig>,
}

impl PolicyStore {
    pub fn new(
        labels: Vec<LabelsConfig>,
        immutables: Vec<ImmutablesConfig>,
        exclusives: Vec<ExclusivesConfig>,
    ) -> Self {
        warn_duplicates("labels", labels.iter().map(|c| c.kind.clone()));
        warn_duplicates("immutables", immutables.iter().map(|c| c.kind.clone()));
        warn_duplicates(
            "exclusives",
            exclusives
                .iter()
                .map(|c| format!("{}/{}/{}", c.group, c.version, c.kind)),
        );
        Self {
            labels,
            immutables,
            exclusives,
        }
    }

    /// Load all dimensions, failing open per dimension.
    ///
    /// A dimension whose document is missing or malformed is left empty
    /// (no rules for any kind) and the failure is logged. The other
    /// dimensions load independently.
    pub fn load(paths: &PolicyPaths) -> Self {
        let labels = load_or_empty("labels", &paths.labels);
        let immutables = load_or_empty("immutables", &paths.immutables);
        let exclusives = load_or_empty("exclusives", &paths.exclusives);
        let store = Self::new(labels, immutables, exclusives);
        info!(
            labels = store.labels.len(),
            immutables = store.immutables.len(),
            exclusives = store.exclusives.len(),
            "Loaded admission policies"
        );
        store
    }

    /// Load all dimensions, returning the first error encountered.
    pub fn try_load(paths: &PolicyPaths) -> Result<Self, ConfigError> {
        Ok(Self::new(
            load_document(&paths.labels)?,
            load_document(&paths.immutables)?,
            load_document(&paths.exclusives)?,
        ))
    }

    /// Label keys that must be present on objects of `kind`, in document
    /// order. Empty when the kind has no entry.
    pub fn required_labels(&self, kind: &str) -> &[String] {
        self.labels
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.labels.as_slice())
            .unwrap_or_default()
    }

    /// Dotted spec paths that may not change on update. Empty when the kind
    /// has no entry.
    pub fn immutable_fields(&self, kind: &str) -> &[String] {
        self.immutables
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.immutables.as_slice())
            .unwrap_or_default()
    }

    /// Mutually exclusive field groups for `group/version/kind`. Stored for
    /// consumers of the store; the validation pipeline does not enforce them.
    pub fn exclusive_groups(&self, kind: &str, group: &str, version: &str) -> &[Vec<String>] {
        self.exclusives
            .iter()
            .find(|c| c.kind == kind && c.group == group && c.version == version)
            .map(|c| c.exclusives.as_slice())
            .unwrap_or_default()
    }

    /// Number of configured entries per dimension, labels/immutables/exclusives
    pub fn rule_counts(&self) -> (usize, usize, usize) {
        (
            self.labels.len(),
            self.immutables.len(),
            self.exclusives.len(),
        )
    }
}

/// Read and parse a policy document (a JSON sequence of entries).
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_or_empty<T: DeserializeOwned>(dimension: &str, path: &Path) -> Vec<T> {
    match load_document(path) {
        Ok(entries) => entries,
        Err(e) if e.is_missing() => {
            warn!(dimension, path = %path.display(), "Policy document not found, dimension disabled");
            Vec::new()
        }
        Err(e) => {
            error!(dimension, error = %e, "Failed to load policy document, dimension disabled");
            Vec::new()
        }
    }
}

fn warn_duplicates(dimension: &str, keys: impl Iterator<Item = String>) {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            warn!(dimension, kind = %key, "Duplicate policy entry ignored, first entry wins");
        }
    }
}
