//! Primitive value validators for covenant schemas.
//!
//! Every factory returns a [`Validator`] ready to drop into a
//! `PropertyDefinition`. Rejections carry one reason; length and range
//! failures also carry `{ min, max }` metadata so callers can render the
//! bound that was missed.

mod array;
mod number;
mod string;

pub use array::{ArrayRules, array};
pub use number::{NumberRules, number};
pub use string::{StringRules, string};

use covenant_model::{Context, Validation, Validator, is_equal};
use serde_json::{Value, json};
use thiserror::Error;

/// Reason for a value outside an enumeration or pattern.
pub const UNACCEPTABLE_VALUE: &str = "Unacceptable value";

/// Errors raised while building validator rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// Accepts booleans only.
#[must_use]
pub fn boolean() -> Validator {
    Validator::new(|value: &Value, _: &Context| {
        Ok(if value.is_boolean() {
            Validation::valid()
        } else {
            Validation::invalid("Expected a boolean")
        })
    })
}

/// Accepts any value structurally equal to one of `allowed`.
#[must_use]
pub fn one_of<I>(allowed: I) -> Validator
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let allowed: Vec<Value> = allowed.into_iter().map(Into::into).collect();
    Validator::new(move |value: &Value, _: &Context| {
        Ok(if contains(&allowed, value) {
            Validation::valid()
        } else {
            Validation::invalid(UNACCEPTABLE_VALUE).with_metadata(json!({ "allowed": allowed }))
        })
    })
}

pub(crate) fn contains(values: &[Value], value: &Value) -> bool {
    values.iter().any(|v| is_equal(v, value))
}

/// Checks `len` against optional bounds.
pub(crate) fn check_length(
    len: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> Option<Validation> {
    let reason = if min.is_some_and(|min| len < min) {
        "Too short"
    } else if max.is_some_and(|max| len > max) {
        "Too long"
    } else {
        return None;
    };
    Some(Validation::invalid(reason).with_metadata(json!({ "min": min, "max": max })))
}
