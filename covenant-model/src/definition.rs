//! Property definitions as authored, before classification.
//!
//! A [`PropertyDefinition`] is deliberately loose: any rule name can be set to
//! any [`Rule`] payload, so definitions loaded from JSON and definitions built
//! in code go through the same checks. Nothing here decides whether a
//! combination makes sense; that is the classifier's job.

use crate::callable::{Handler, Predicate, Sanitizer, Setter, Validator};
use crate::error::SchemaError;
use covenant_types::ErrorCollector;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Rule names understood by the classifier.
pub mod rules {
    pub const ALIAS: &str = "alias";
    pub const CONSTANT: &str = "constant";
    pub const DEFAULT: &str = "default";
    pub const DEPENDENT: &str = "dependent";
    pub const DEPENDS_ON: &str = "dependsOn";
    pub const ON_CREATE: &str = "onCreate";
    pub const ON_DELETE: &str = "onDelete";
    pub const ON_FAILURE: &str = "onFailure";
    pub const ON_SUCCESS: &str = "onSuccess";
    pub const ON_UPDATE: &str = "onUpdate";
    pub const READONLY: &str = "readonly";
    pub const REQUIRED: &str = "required";
    pub const REQUIRED_ERROR: &str = "requiredError";
    pub const RESOLVER: &str = "resolver";
    pub const SANITIZER: &str = "sanitizer";
    pub const SHOULD_INIT: &str = "shouldInit";
    pub const SHOULD_UPDATE: &str = "shouldUpdate";
    pub const VALIDATOR: &str = "validator";
    pub const VALUE: &str = "value";
    pub const VIRTUAL: &str = "virtual";

    /// Every known rule, sorted.
    pub const ALL: &[&str] = &[
        ALIAS,
        CONSTANT,
        DEFAULT,
        DEPENDENT,
        DEPENDS_ON,
        ON_CREATE,
        ON_DELETE,
        ON_FAILURE,
        ON_SUCCESS,
        ON_UPDATE,
        READONLY,
        REQUIRED,
        REQUIRED_ERROR,
        RESOLVER,
        SANITIZER,
        SHOULD_INIT,
        SHOULD_UPDATE,
        VALIDATOR,
        VALUE,
        VIRTUAL,
    ];

    /// Life-cycle handler rules.
    pub const HANDLERS: &[&str] = &[ON_CREATE, ON_DELETE, ON_FAILURE, ON_SUCCESS, ON_UPDATE];
}

/// The payload of one rule.
#[derive(Clone)]
pub enum Rule {
    Literal(Value),
    Setter(Setter),
    Predicate(Predicate),
    Validator(Validator),
    Sanitizer(Sanitizer),
    Handlers(Vec<Handler>),
}

impl Rule {
    pub(crate) fn literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn is_literal(&self, expected: &Value) -> bool {
        self.literal() == Some(expected)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "Literal({value})"),
            Self::Setter(_) => f.write_str("Setter(..)"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Validator(_) => f.write_str("Validator(..)"),
            Self::Sanitizer(_) => f.write_str("Sanitizer(..)"),
            Self::Handlers(handlers) => write!(f, "Handlers({})", handlers.len()),
        }
    }
}

impl From<Value> for Rule {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<bool> for Rule {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

impl From<&str> for Rule {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<Setter> for Rule {
    fn from(setter: Setter) -> Self {
        Self::Setter(setter)
    }
}

impl From<Predicate> for Rule {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

impl From<Validator> for Rule {
    fn from(validator: Validator) -> Self {
        Self::Validator(validator)
    }
}

impl From<Sanitizer> for Rule {
    fn from(sanitizer: Sanitizer) -> Self {
        Self::Sanitizer(sanitizer)
    }
}

impl From<Handler> for Rule {
    fn from(handler: Handler) -> Self {
        Self::Handlers(vec![handler])
    }
}

impl From<Vec<Handler>> for Rule {
    fn from(handlers: Vec<Handler>) -> Self {
        Self::Handlers(handlers)
    }
}

/// What a definition looked like when it was loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefinitionShape {
    #[default]
    Object,
    Array,
    Scalar,
}

/// One property's rules, as authored.
#[derive(Debug, Clone, Default)]
pub struct PropertyDefinition {
    shape: DefinitionShape,
    rules: BTreeMap<String, Rule>,
}

/// Property definitions keyed by property name.
pub type Definitions = BTreeMap<String, PropertyDefinition>;

impl PropertyDefinition {
    #[must_use]
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Builds a definition from JSON. Objects become literal rules; anything
    /// else is kept as a malformed definition for the classifier to reject.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                shape: DefinitionShape::Object,
                rules: map.into_iter().map(|(k, v)| (k, Rule::Literal(v))).collect(),
            },
            Value::Array(_) => Self {
                shape: DefinitionShape::Array,
                rules: BTreeMap::new(),
            },
            _ => Self {
                shape: DefinitionShape::Scalar,
                rules: BTreeMap::new(),
            },
        }
    }

    #[must_use]
    pub fn shape(&self) -> DefinitionShape {
        self.shape
    }

    #[must_use]
    pub fn get(&self, rule: &str) -> Option<&Rule> {
        self.rules.get(rule)
    }

    #[must_use]
    pub fn has(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }

    /// Rule names in sorted order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Sets any rule, known or not.
    #[must_use]
    pub fn rule(mut self, name: &str, rule: impl Into<Rule>) -> Self {
        self.rules.insert(name.to_string(), rule.into());
        self
    }

    fn push_handler(mut self, name: &str, handler: Handler) -> Self {
        match self.rules.get_mut(name) {
            Some(Rule::Handlers(handlers)) => handlers.push(handler),
            _ => {
                self.rules
                    .insert(name.to_string(), Rule::Handlers(vec![handler]));
            }
        }
        self
    }

    #[must_use]
    pub fn default(self, value: impl Into<Value>) -> Self {
        self.rule(rules::DEFAULT, Rule::Literal(value.into()))
    }

    #[must_use]
    pub fn default_with(self, setter: Setter) -> Self {
        self.rule(rules::DEFAULT, setter)
    }

    #[must_use]
    pub fn constant(self) -> Self {
        self.rule(rules::CONSTANT, true)
    }

    #[must_use]
    pub fn value(self, value: impl Into<Value>) -> Self {
        self.rule(rules::VALUE, Rule::Literal(value.into()))
    }

    #[must_use]
    pub fn value_with(self, setter: Setter) -> Self {
        self.rule(rules::VALUE, setter)
    }

    #[must_use]
    pub fn dependent(self) -> Self {
        self.rule(rules::DEPENDENT, true)
    }

    #[must_use]
    pub fn depends_on<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<Value> = names.into_iter().map(|n| Value::String(n.into())).collect();
        self.rule(rules::DEPENDS_ON, Rule::Literal(Value::Array(names)))
    }

    #[must_use]
    pub fn resolver(self, setter: Setter) -> Self {
        self.rule(rules::RESOLVER, setter)
    }

    #[must_use]
    pub fn readonly(self) -> Self {
        self.rule(rules::READONLY, true)
    }

    #[must_use]
    pub fn readonly_lax(self) -> Self {
        self.rule(rules::READONLY, "lax")
    }

    #[must_use]
    pub fn required(self) -> Self {
        self.rule(rules::REQUIRED, true)
    }

    #[must_use]
    pub fn required_by(self, predicate: Predicate) -> Self {
        self.rule(rules::REQUIRED, predicate)
    }

    #[must_use]
    pub fn required_error(self, message: &str) -> Self {
        self.rule(rules::REQUIRED_ERROR, message)
    }

    #[must_use]
    pub fn required_error_with(self, setter: Setter) -> Self {
        self.rule(rules::REQUIRED_ERROR, setter)
    }

    /// Marks the property as a virtual input (`virtual: true`).
    #[must_use]
    pub fn virtual_input(self) -> Self {
        self.rule(rules::VIRTUAL, true)
    }

    #[must_use]
    pub fn alias(self, alias: &str) -> Self {
        self.rule(rules::ALIAS, alias)
    }

    #[must_use]
    pub fn validator(self, validator: Validator) -> Self {
        self.rule(rules::VALIDATOR, validator)
    }

    #[must_use]
    pub fn sanitizer(self, sanitizer: Sanitizer) -> Self {
        self.rule(rules::SANITIZER, sanitizer)
    }

    #[must_use]
    pub fn should_init(self, allowed: bool) -> Self {
        self.rule(rules::SHOULD_INIT, allowed)
    }

    #[must_use]
    pub fn should_init_when(self, predicate: Predicate) -> Self {
        self.rule(rules::SHOULD_INIT, predicate)
    }

    #[must_use]
    pub fn should_update(self, allowed: bool) -> Self {
        self.rule(rules::SHOULD_UPDATE, allowed)
    }

    #[must_use]
    pub fn should_update_when(self, predicate: Predicate) -> Self {
        self.rule(rules::SHOULD_UPDATE, predicate)
    }

    #[must_use]
    pub fn on_create(self, handler: Handler) -> Self {
        self.push_handler(rules::ON_CREATE, handler)
    }

    #[must_use]
    pub fn on_update(self, handler: Handler) -> Self {
        self.push_handler(rules::ON_UPDATE, handler)
    }

    #[must_use]
    pub fn on_delete(self, handler: Handler) -> Self {
        self.push_handler(rules::ON_DELETE, handler)
    }

    #[must_use]
    pub fn on_success(self, handler: Handler) -> Self {
        self.push_handler(rules::ON_SUCCESS, handler)
    }

    #[must_use]
    pub fn on_failure(self, handler: Handler) -> Self {
        self.push_handler(rules::ON_FAILURE, handler)
    }
}

/// Parses a whole set of definitions from a JSON object.
///
/// Individual malformed definitions are kept (and later rejected with a
/// per-property reason); only a non-object top level fails here.
pub fn definitions_from_json(value: Value) -> Result<Definitions, SchemaError> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(name, def)| (name, PropertyDefinition::from_json(def)))
            .collect()),
        _ => {
            let mut errors = ErrorCollector::new();
            errors.add("schema", "A schema must be an object of property definitions");
            Err(SchemaError::Invalid {
                payload: errors.into_payload(),
            })
        }
    }
}
