//! Unit tests for policy document loading
//!
//! Documents are written to a temporary directory in the format mounted
//! from the policy ConfigMaps.

use std::path::PathBuf;
use std::sync::Arc;

use admission_control::policy::{ConfigError, PolicyPaths, PolicyStore};
use admission_control::webhooks::Operation;
use admission_control::{AdmissionValidator, Enforcement};
use serde_json::json;

use crate::common::*;

const LABELS_DOC: &str = r#"[
  {"kind": "Service", "labels": ["owner", "cost-center"]},
  {"kind": "Binding", "labels": ["owner"]},
  {"kind": "Service", "labels": ["ignored"]}
]"#;

const IMMUTABLES_DOC: &str = r#"[
  {"kind": "Service", "immutables": ["spec.serviceClass", "spec.plan"]}
]"#;

const EXCLUSIVES_DOC: &str = r#"[
  {"kind": "Service", "group": "ibmcloud.ibm.com", "version": "v1alpha1",
   "exclusives": [["spec.plan", "spec.externalName"]]}
]"#;

struct PolicyDir {
    _dir: tempfile::TempDir,
    paths: PolicyPaths,
}

fn policy_dir(labels: Option<&str>, immutables: Option<&str>, exclusives: Option<&str>) -> PolicyDir {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, contents: Option<&str>| -> PathBuf {
        let path = dir.path().join(name);
        if let Some(contents) = contents {
            std::fs::write(&path, contents).unwrap();
        }
        path
    };
    let paths = PolicyPaths {
        labels: write("labels", labels),
        immutables: write("immutables", immutables),
        exclusives: write("exclusives", exclusives),
    };
    PolicyDir { _dir: dir, paths }
}

mod loading_tests {
    use super::*;

    #[test]
    fn test_load_all_dimensions() {
        let dir = policy_dir(Some(LABELS_DOC), Some(IMMUTABLES_DOC), Some(EXCLUSIVES_DOC));
        let store = PolicyStore::try_load(&dir.paths).unwrap();

        assert_eq!(
            store.required_labels("Service"),
            ["owner".to_string(), "cost-center".to_string()]
        );
        assert_eq!(store.required_labels("Binding"), ["owner".to_string()]);
        assert_eq!(
            store.immutable_fields("Service"),
            ["spec.serviceClass".to_string(), "spec.plan".to_string()]
        );
        assert_eq!(
            store.exclusive_groups("Service", "ibmcloud.ibm.com", "v1alpha1"),
            [vec!["spec.plan".to_string(), "spec.externalName".to_string()]]
        );
    }

    #[test]
    fn test_missing_documents_disable_dimension() {
        let dir = policy_dir(None, Some(IMMUTABLES_DOC), None);

        let store = PolicyStore::load(&dir.paths);
        assert!(store.required_labels("Service").is_empty());
        assert_eq!(store.immutable_fields("Service").len(), 2);

        assert!(matches!(
            PolicyStore::try_load(&dir.paths),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_malformed_document_disables_only_that_dimension() {
        let dir = policy_dir(Some(LABELS_DOC), Some(r#"{"kind":"Service"}"#), Some(EXCLUSIVES_DOC));

        let store = PolicyStore::load(&dir.paths);
        assert_eq!(store.required_labels("Service").len(), 2);
        assert!(store.immutable_fields("Service").is_empty());
        assert_eq!(store.rule_counts(), (3, 0, 1));

        assert!(matches!(
            PolicyStore::try_load(&dir.paths),
            Err(ConfigError::Parse { .. })
        ));
    }
}

mod loaded_policy_tests {
    use super::*;

    #[tokio::test]
    async fn test_loaded_policies_drive_validation() {
        let dir = policy_dir(Some(LABELS_DOC), Some(IMMUTABLES_DOC), None);
        let cluster = Arc::new(FakeCluster::new().with_stored(
            "Service",
            "db",
            json!({ "plan": "gold", "serviceClass": "db-service" }),
        ));
        let v = AdmissionValidator::new(
            Arc::new(PolicyStore::load(&dir.paths)),
            Enforcement::all(),
            cluster,
            Arc::new(FakeCatalog::new()),
        );

        let labels = [("owner", "a"), ("cost-center", "42")];
        let decision = v
            .validate(&request(
                Operation::Update,
                "Service",
                "db",
                &labels,
                json!({ "plan": "gold", "serviceClass": "other-service" }),
            ))
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.message, "spec.serviceclass is immutable. ");
    }
}
