//! Error types for policy document loading

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("policy document not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read policy document {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed policy document {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// A missing document is an expected deployment state (dimension not
    /// configured); anything else is an operator mistake.
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigError::Missing { .. })
    }
}
