//! Property-based tests for structural equality.
//!
//! `is_equal` backs change detection in updates, so it must behave like a
//! real equivalence relation over arbitrary JSON.

use covenant_types::is_equal;
use proptest::prelude::*;
use serde_json::Value;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn equality_is_reflexive(v in value_strategy()) {
        prop_assert!(is_equal(&v, &v));
    }

    #[test]
    fn equality_is_symmetric(a in value_strategy(), b in value_strategy()) {
        prop_assert_eq!(is_equal(&a, &b), is_equal(&b, &a));
    }

    #[test]
    fn equality_agrees_with_serde_for_non_numeric_differences(
        a in "[a-z]{0,8}",
        b in "[a-z]{0,8}",
    ) {
        let (a, b) = (Value::String(a), Value::String(b));
        prop_assert_eq!(is_equal(&a, &b), a == b);
    }

    #[test]
    fn integer_equals_its_float_form(n in -1_000_000i64..1_000_000) {
        prop_assert!(is_equal(&Value::from(n), &Value::from(n as f64)));
    }
}
