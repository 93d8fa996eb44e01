//! Property-based tests for cluster path derivation and value resolution.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::cluster_path;
    use crate::values::{resolve, Values};
    use proptest::prelude::*;
    use serde_yaml::Value;
    use std::path::PathBuf;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9-]{0,11}"
    }

    fn layer() -> impl Strategy<Value = Values> {
        prop::collection::btree_map("[a-e]", any::<i64>().prop_map(Value::from), 0..5)
    }

    // ============================================================================
    // cluster_path property tests
    // ============================================================================

    proptest! {
        /// Property: a key made of plain segments maps to exactly those segments
        #[test]
        fn cluster_path_mirrors_segments(segments in prop::collection::vec(segment(), 1..5)) {
            let key = segments.join("/");
            let path = cluster_path(&key).unwrap();
            let expected: PathBuf = segments.iter().collect();
            prop_assert_eq!(path, expected);
        }

        /// Property: cluster_path is deterministic (same key = same path)
        #[test]
        fn cluster_path_is_deterministic(segments in prop::collection::vec(segment(), 1..5)) {
            let key = segments.join("/");
            prop_assert_eq!(cluster_path(&key).unwrap(), cluster_path(&key).unwrap());
        }

        /// Property: any key containing a parent segment is rejected
        #[test]
        fn cluster_path_rejects_parent_segments(
            before in prop::collection::vec(segment(), 0..3),
            after in prop::collection::vec(segment(), 0..3),
        ) {
            let mut segments = before;
            segments.push("..".to_string());
            segments.extend(after);
            prop_assert!(cluster_path(&segments.join("/")).is_err());
        }
    }

    // ============================================================================
    // resolve property tests
    // ============================================================================

    proptest! {
        /// Property: every resolved key holds the value of the last layer defining it
        #[test]
        fn resolve_last_layer_wins(layers in prop::collection::vec(layer(), 0..5)) {
            let resolved = resolve(&layers);
            for (key, value) in &resolved {
                let last = layers.iter().rev().find_map(|l| l.get(key)).unwrap();
                prop_assert_eq!(value, last);
            }
            let key_count = layers
                .iter()
                .flat_map(|l| l.keys())
                .collect::<std::collections::BTreeSet<_>>()
                .len();
            prop_assert_eq!(resolved.len(), key_count);
        }

        /// Property: resolving never mutates its inputs
        #[test]
        fn resolve_leaves_inputs_untouched(layers in prop::collection::vec(layer(), 0..5)) {
            let before = layers.clone();
            let _ = resolve(&layers);
            prop_assert_eq!(before, layers);
        }
    }
}
