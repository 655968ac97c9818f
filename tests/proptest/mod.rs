// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for spec flattening and immutability decisions
//!
//! These tests use proptest to generate random documents and verify that:
//! 1. Flattening is total: every node is reachable under exactly one path
//! 2. Flat input flattens to exactly its prefixed keys
//! 3. Integer/float re-encoding never registers as a change
//! 4. Kinds without immutable fields are always allowed on update, whatever
//!    their apiVersion

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use admission_control::policy::{canonical_string, flatten};
use common::*;

// =============================================================================
// Strategy generators for JSON documents
// =============================================================================

/// Generate a scalar or array leaf
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9-]{0,8}".prop_map(Value::String),
        prop::collection::vec(any::<i32>(), 0..3).prop_map(|v| json!(v)),
    ]
}

/// Generate a nested object with lower-case, dot-free keys
fn document() -> impl Strategy<Value = Value> {
    let tree = leaf().prop_recursive(4, 48, 5, |inner| {
        prop::collection::btree_map("[a-z]{1,5}", inner, 0..5)
            .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
    });
    prop::collection::btree_map("[a-z]{1,5}", tree, 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}

/// Generate a flat object (no nested objects)
fn flat_document() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-zA-Z]{1,6}", leaf(), 0..8).prop_map(|m| m.into_iter().collect())
}

/// Generate an apiVersion, with or without a group
fn api_versions() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("v1".to_string()),
        "v[1-3](alpha1|beta1)?",
        "[a-z]{1,8}\\.example\\.com/v[1-3]",
    ]
}

/// Every non-root node of `value` keyed by its dotted path
fn expected_paths(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            let path = format!("{}.{}", prefix, key);
            out.insert(path.clone(), child.clone());
            expected_paths(&path, child, out);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn flatten_is_total(doc in document()) {
        let flat = flatten("spec", &doc);
        let mut expected = BTreeMap::new();
        expected_paths("spec", &doc, &mut expected);

        prop_assert_eq!(flat.len(), expected.len());
        for (path, value) in &expected {
            prop_assert_eq!(flat.get(path), Some(value));
        }
    }

    #[test]
    fn flatten_flat_input_prefixes_keys(map in flat_document()) {
        let distinct: std::collections::BTreeSet<String> =
            map.keys().map(|k| k.to_lowercase()).collect();
        let flat = flatten("spec", &Value::Object(map.clone()));

        prop_assert_eq!(flat.len(), distinct.len());
        for key in map.keys() {
            let path = format!("spec.{}", key.to_lowercase());
            prop_assert!(flat.contains_key(&path));
        }
    }

    #[test]
    fn flatten_is_deterministic(doc in document()) {
        prop_assert_eq!(flatten("spec", &doc), flatten("spec", &doc));
    }

    #[test]
    fn int_float_encoding_is_invariant(n in -1_000_000_000i64..1_000_000_000i64) {
        let stored = json!(n);
        let incoming = json!(n as f64);
        prop_assert_eq!(canonical_string(Some(&stored)), canonical_string(Some(&incoming)));
    }

    #[test]
    fn distinct_integers_stay_distinct(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(a != b);
        prop_assert_ne!(
            canonical_string(Some(&json!(a))),
            canonical_string(Some(&json!(b as f64)))
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn update_without_immutables_is_allowed(
        stored in document(),
        incoming in document(),
        api_version in api_versions(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let cluster = Arc::new(FakeCluster::new().with_stored("Widget", "w", stored));
        let v = validator(
            policies(vec![], vec![immutables_rule("Other", &["spec.a", "spec.b"])]),
            cluster.clone(),
            Arc::new(FakeCatalog::new()),
        );

        let mut input = update("Widget", "w", incoming);
        input.object["apiVersion"] = json!(api_version);

        let decision = runtime.block_on(v.validate(&input));
        prop_assert!(decision.allowed, "unexpected denial: {}", decision.message);
        prop_assert!(decision.message.is_empty());
        prop_assert_eq!(cluster.fetch_count(), 0);
    }

    #[test]
    fn unchanged_spec_is_allowed(spec in document()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        // Every top-level key of the spec is immutable
        let fields: Vec<String> = spec
            .as_object()
            .map(|m| m.keys().map(|k| format!("spec.{}", k)).collect())
            .unwrap_or_default();
        let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();

        let v = validator(
            policies(vec![], vec![immutables_rule("Widget", &field_refs)]),
            Arc::new(FakeCluster::new().with_stored("Widget", "w", spec.clone())),
            Arc::new(FakeCatalog::new()),
        );

        let decision = runtime.block_on(v.validate(&update("Widget", "w", spec)));
        prop_assert!(decision.allowed, "unexpected denial: {}", decision.message);
    }
}
