//! Structural equality over JSON values.
//!
//! `serde_json::Value`'s own `PartialEq` distinguishes `1` from `1.0`
//! because they are stored as different number variants. Entity updates
//! must not count that as a change, so numbers are compared by the value
//! they denote.

use crate::Record;
use serde_json::Value;

/// Returns true if `a` and `b` are structurally equal.
///
/// Objects compare key-by-key regardless of insertion order, arrays compare
/// element-by-element, and numbers compare numerically.
#[must_use]
pub fn is_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| is_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => is_equal_record(x, y),
        _ => a == b,
    }
}

/// Returns true if two records hold the same keys with structurally equal values.
#[must_use]
pub fn is_equal_record(a: &Record, b: &Record) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, left)| b.get(key).is_some_and(|right| is_equal(left, right)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_floats_with_same_value_are_equal() {
        assert!(is_equal(&json!(1), &json!(1.0)));
        assert!(!is_equal(&json!(1), &json!(1.5)));
    }

    #[test]
    fn negative_and_unsigned_numbers() {
        assert!(is_equal(&json!(-3), &json!(-3.0)));
        assert!(is_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!is_equal(&json!(-1), &json!(u64::MAX)));
    }

    #[test]
    fn object_key_order_is_irrelevant() {
        let a = json!({"x": 1, "y": [1, 2]});
        let b = json!({"y": [1.0, 2], "x": 1});
        assert!(is_equal(&a, &b));
    }

    #[test]
    fn missing_key_is_not_equal() {
        assert!(!is_equal(&json!({"x": 1}), &json!({"x": 1, "y": null})));
    }

    #[test]
    fn null_differs_from_everything_but_null() {
        assert!(is_equal(&Value::Null, &Value::Null));
        assert!(!is_equal(&Value::Null, &json!(0)));
        assert!(!is_equal(&Value::Null, &json!("")));
    }
}
