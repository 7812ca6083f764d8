use crate::{UNACCEPTABLE_VALUE, contains};
use covenant_model::{Context, Validation, Validator};
use serde_json::{Value, json};

/// Constraints for [`number`].
#[derive(Debug, Clone, Default)]
pub struct NumberRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
    /// Bounds exclude the values themselves.
    pub exclusive: bool,
    pub one_of: Vec<Value>,
}

impl NumberRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    #[must_use]
    pub fn one_of<I, N>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Value>,
    {
        self.one_of = allowed.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self, value: &Value) -> Validation {
        let Some(n) = value.as_f64() else {
            return Validation::invalid("Expected a number");
        };
        if self.integer && n.fract() != 0.0 {
            return Validation::invalid("Expected an integer");
        }
        if !self.one_of.is_empty() && !contains(&self.one_of, value) {
            return Validation::invalid(UNACCEPTABLE_VALUE);
        }

        let below = self
            .min
            .is_some_and(|min| if self.exclusive { n <= min } else { n < min });
        let above = self
            .max
            .is_some_and(|max| if self.exclusive { n >= max } else { n > max });
        let reason = match (below, above) {
            (true, _) => "Too small",
            (_, true) => "Too large",
            _ => return Validation::valid(),
        };
        Validation::invalid(reason).with_metadata(json!({ "min": self.min, "max": self.max }))
    }
}

/// Accepts numbers satisfying `rules`.
#[must_use]
pub fn number(rules: NumberRules) -> Validator {
    Validator::new(move |value: &Value, _: &Context| Ok(rules.check(value)))
}
