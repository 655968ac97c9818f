//! Process configuration
//!
//! Everything is read from the environment once at startup. Variable names
//! match the existing deployment manifests.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::catalog::{DEFAULT_CATALOG_TIMEOUT, DEFAULT_CATALOG_URI};
use crate::policy::PolicyPaths;

pub const ENV_LABELS: &str = "ADMISSION_CONTROL_LABELS";
pub const ENV_IMMUTABLES: &str = "ADMISSION_CONTROL_IMMUTABLES";

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Which policy stages run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enforcement {
    pub labels: bool,
    pub immutables: bool,
}

impl Enforcement {
    pub fn all() -> Self {
        Self {
            labels: true,
            immutables: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub enforcement: Enforcement,
    pub policy_paths: PolicyPaths,
    pub catalog_uri: String,
    pub catalog_timeout: Duration,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub webhook_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enforcement: Enforcement::default(),
            policy_paths: PolicyPaths::default(),
            catalog_uri: DEFAULT_CATALOG_URI.to_string(),
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            webhook_port: WEBHOOK_PORT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let path = |name: &str, default: PathBuf| lookup(name).map(PathBuf::from).unwrap_or(default);

        Self {
            enforcement: Enforcement {
                labels: lookup(ENV_LABELS).as_deref() == Some("true"),
                immutables: lookup(ENV_IMMUTABLES).as_deref() == Some("true"),
            },
            policy_paths: PolicyPaths {
                labels: path("LABELS_CONFIG_PATH", defaults.policy_paths.labels),
                immutables: path("IMMUTABLES_CONFIG_PATH", defaults.policy_paths.immutables),
                exclusives: path("EXCLUSIVES_CONFIG_PATH", defaults.policy_paths.exclusives),
            },
            catalog_uri: lookup("CATALOG_URI").unwrap_or(defaults.catalog_uri),
            catalog_timeout: parse_or("CATALOG_TIMEOUT_SECS", lookup("CATALOG_TIMEOUT_SECS"))
                .map(Duration::from_secs)
                .unwrap_or(defaults.catalog_timeout),
            cert_path: path("WEBHOOK_CERT_PATH", defaults.cert_path),
            key_path: path("WEBHOOK_KEY_PATH", defaults.key_path),
            webhook_port: parse_or("WEBHOOK_PORT", lookup("WEBHOOK_PORT"))
                .unwrap_or(defaults.webhook_port),
        }
    }

    pub fn log_settings(&self) {
        info!(
            ADMISSION_CONTROL_LABELS = self.enforcement.labels,
            ADMISSION_CONTROL_IMMUTABLES = self.enforcement.immutables,
            "Policy enforcement settings"
        );
        info!(
            catalog_uri = %self.catalog_uri,
            catalog_timeout_secs = self.catalog_timeout.as_secs(),
            webhook_port = self.webhook_port,
            "Webhook settings"
        );
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = name, value = %value, "Ignoring unparsable setting, using default");
            None
        }
    }
}
