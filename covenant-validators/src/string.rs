use crate::{RuleError, UNACCEPTABLE_VALUE, check_length};
use covenant_model::{Context, Validation, Validator};
use regex_lite::Regex;
use serde_json::Value;

/// Constraints for [`string`]. Lengths count characters, after trimming.
#[derive(Debug, Clone, Default)]
pub struct StringRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub trim: bool,
    pub pattern: Option<Regex>,
    pub one_of: Vec<String>,
}

impl StringRules {
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
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Requires `pattern` to match the value. Unanchored patterns match
    /// anywhere.
    pub fn matching(mut self, pattern: &str) -> Result<Self, RuleError> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn one_of<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = allowed.into_iter().map(Into::into).collect();
        self
    }

    fn check(&self, value: &Value) -> Validation {
        let Some(raw) = value.as_str() else {
            return Validation::invalid("Expected a string");
        };
        let text = if self.trim { raw.trim() } else { raw };

        if !self.one_of.is_empty() && !self.one_of.iter().any(|allowed| allowed == text) {
            return Validation::invalid(UNACCEPTABLE_VALUE);
        }
        let len = text.chars().count();
        if let Some(failure) = check_length(len, self.min_length, self.max_length) {
            return failure;
        }
        if self.pattern.as_ref().is_some_and(|re| !re.is_match(text)) {
            return Validation::invalid(UNACCEPTABLE_VALUE);
        }

        if self.trim {
            Validation::validated(text)
        } else {
            Validation::valid()
        }
    }
}

/// Accepts strings satisfying `rules`; a trimmed string replaces the input.
#[must_use]
pub fn string(rules: StringRules) -> Validator {
    Validator::new(move |value: &Value, _: &Context| Ok(rules.check(value)))
}
