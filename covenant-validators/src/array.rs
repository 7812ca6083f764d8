use crate::{check_length, contains};
use covenant_model::{Context, Validation, Validator};
use serde_json::Value;

/// Constraints for [`array`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Drops repeated elements (first occurrence wins) before length checks.
    pub unique: bool,
}

impl ArrayRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn check(&self, value: &Value) -> Validation {
        let Some(items) = value.as_array() else {
            return Validation::invalid("Expected an array");
        };
        let deduped = self.unique.then(|| {
            items.iter().fold(Vec::with_capacity(items.len()), |mut kept, item| {
                if !contains(&kept, item) {
                    kept.push(item.clone());
                }
                kept
            })
        });
        let len = deduped.as_ref().map_or(items.len(), Vec::len);

        if let Some(failure) = check_length(len, self.min_length, self.max_length) {
            return failure;
        }
        match deduped {
            Some(kept) if kept.len() != items.len() => Validation::validated(kept),
            _ => Validation::valid(),
        }
    }
}

/// Accepts arrays satisfying `rules`.
#[must_use]
pub fn array(rules: ArrayRules) -> Validator {
    Validator::new(move |value: &Value, _: &Context| Ok(rules.check(value)))
}
