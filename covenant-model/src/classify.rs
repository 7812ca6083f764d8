//! Rule classification.
//!
//! Each authored definition is checked on its own and either lands in exactly
//! one [`PropertyKind`] or is rejected with every reason found. Checks run in
//! a fixed order (constant, dependent, readonly, required, virtual,
//! handlers, gates, final admissibility) so diagnostics are stable.
//!
//! Classification is pure: it registers nothing anywhere. Cross-property
//! checks (dependency targets, cycles, aliases) belong to [`crate::graph`].

use crate::callable::{Handler, Predicate, Sanitizer, Setter, Validator};
use crate::definition::{DefinitionShape, PropertyDefinition, Rule, rules};
use crate::options::Gate;
use serde_json::Value;

const CONSTANT_RULES: &[&str] = &[
    rules::CONSTANT,
    rules::ON_DELETE,
    rules::ON_SUCCESS,
    rules::VALUE,
];

const VIRTUAL_RULES: &[&str] = &[
    rules::ALIAS,
    rules::ON_FAILURE,
    rules::ON_SUCCESS,
    rules::REQUIRED,
    rules::REQUIRED_ERROR,
    rules::SANITIZER,
    rules::SHOULD_INIT,
    rules::SHOULD_UPDATE,
    rules::VALIDATOR,
    rules::VIRTUAL,
];

/// The public category of a classified property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Constant,
    Dependent,
    /// Has a default and no initialization or update ceremony
    /// (includes `readonly: "lax"`).
    Lax,
    /// `readonly: true`: set at creation only.
    Readonly,
    /// Readonly (strict or lax) with a `required` predicate.
    ReadonlyRequiredBy,
    /// `required: true`.
    Required,
    /// `required` is a predicate over the context.
    RequiredBy,
    Virtual,
}

/// A default or constant value: literal, or computed from the context.
#[derive(Debug, Clone)]
pub(crate) enum ValueSource {
    Literal(Value),
    Setter(Setter),
}

/// Message used when a required-by property turns out to be missing.
#[derive(Debug, Clone)]
pub(crate) enum RequiredError {
    Literal(String),
    Setter(Setter),
}

#[derive(Debug, Clone)]
pub(crate) enum PropertyKind {
    Constant {
        value: ValueSource,
    },
    Dependent {
        default: ValueSource,
        depends_on: Vec<String>,
        resolver: Setter,
        readonly: bool,
    },
    Lax {
        default: ValueSource,
        /// `readonly: "lax"`.
        readonly: bool,
    },
    Readonly {
        default: ValueSource,
    },
    Required,
    RequiredBy {
        default: ValueSource,
        predicate: Predicate,
        error: Option<RequiredError>,
        readonly: bool,
    },
    Virtual {
        alias: Option<String>,
        sanitizer: Option<Sanitizer>,
        required: Option<(Predicate, Option<RequiredError>)>,
    },
}

/// Life-cycle handlers of one property.
#[derive(Debug, Clone, Default)]
pub(crate) struct LifeCycle {
    pub(crate) on_create: Vec<Handler>,
    pub(crate) on_update: Vec<Handler>,
    pub(crate) on_delete: Vec<Handler>,
    pub(crate) on_success: Vec<Handler>,
    pub(crate) on_failure: Vec<Handler>,
}

/// A property that passed classification.
#[derive(Debug, Clone)]
pub(crate) struct ClassifiedProperty {
    pub(crate) name: String,
    pub(crate) kind: PropertyKind,
    pub(crate) validator: Option<Validator>,
    pub(crate) should_init: Option<Gate>,
    pub(crate) should_update: Option<Gate>,
    pub(crate) handlers: LifeCycle,
}

impl ClassifiedProperty {
    pub(crate) fn category(&self) -> Category {
        match &self.kind {
            PropertyKind::Constant { .. } => Category::Constant,
            PropertyKind::Dependent { .. } => Category::Dependent,
            PropertyKind::Lax { .. } => Category::Lax,
            PropertyKind::Readonly { .. } => Category::Readonly,
            PropertyKind::Required => Category::Required,
            PropertyKind::RequiredBy { readonly: true, .. } => Category::ReadonlyRequiredBy,
            PropertyKind::RequiredBy { .. } => Category::RequiredBy,
            PropertyKind::Virtual { .. } => Category::Virtual,
        }
    }

    pub(crate) fn is_virtual(&self) -> bool {
        matches!(self.kind, PropertyKind::Virtual { .. })
    }

    /// The property's default, for every kind that has one.
    pub(crate) fn default(&self) -> Option<&ValueSource> {
        match &self.kind {
            PropertyKind::Dependent { default, .. }
            | PropertyKind::Lax { default, .. }
            | PropertyKind::Readonly { default }
            | PropertyKind::RequiredBy { default, .. } => Some(default),
            _ => None,
        }
    }

    pub(crate) fn alias(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Virtual { alias, .. } => alias.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn depends_on(&self) -> &[String] {
        match &self.kind {
            PropertyKind::Dependent { depends_on, .. } => depends_on,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readonly {
    Strict,
    Lax,
}

#[derive(Debug, Clone)]
enum Required {
    Strict,
    By(Predicate),
}

/// Classifies one definition.
pub(crate) fn classify(
    name: &str,
    definition: &PropertyDefinition,
) -> Result<ClassifiedProperty, Vec<String>> {
    if definition.shape() != DefinitionShape::Object {
        return Err(vec!["Invalid property definition".to_string()]);
    }

    let unknown: Vec<String> = definition
        .rule_names()
        .filter(|rule| !rules::ALL.contains(rule))
        .map(|rule| format!("'{rule}' is not a valid rule"))
        .collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }

    let mut classifier = Classifier {
        name,
        def: definition,
        reasons: Vec::new(),
    };
    let kind = classifier.run();
    if classifier.reasons.is_empty() {
        if let Some(kind) = kind {
            return Ok(ClassifiedProperty {
                name: name.to_string(),
                kind,
                validator: classifier.validator(),
                should_init: classifier.gate(rules::SHOULD_INIT),
                should_update: classifier.gate(rules::SHOULD_UPDATE),
                handlers: classifier.life_cycle(),
            });
        }
    }
    Err(classifier.reasons)
}

struct Classifier<'a> {
    name: &'a str,
    def: &'a PropertyDefinition,
    reasons: Vec<String>,
}

impl Classifier<'_> {
    fn has(&self, rule: &str) -> bool {
        self.def.has(rule)
    }

    fn reject(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    fn run(&mut self) -> Option<PropertyKind> {
        if self.has(rules::CONSTANT) {
            let value = self.check_constant();
            self.check_handlers();
            return value.map(|value| PropertyKind::Constant { value });
        }

        self.check_misplaced_rules();
        let dependent = self.check_dependent();
        let readonly = self.check_readonly();
        self.check_init_blocked(readonly);
        let required = self.check_required(readonly);
        let virtual_kind = self.check_virtual();
        self.check_handlers();
        self.check_gates();
        self.check_types();

        if !self.reasons.is_empty() {
            return None;
        }
        if self.has(rules::DEPENDENT) {
            return dependent;
        }
        if self.has(rules::VIRTUAL) {
            return virtual_kind;
        }

        let default = self.default_source();
        match (required, readonly, default) {
            (Some(Required::Strict), _, _) => Some(PropertyKind::Required),
            (Some(Required::By(predicate)), readonly, Some(default)) => {
                Some(PropertyKind::RequiredBy {
                    default,
                    predicate,
                    error: self.required_error(),
                    readonly: readonly.is_some(),
                })
            }
            (None, Some(Readonly::Strict), Some(default)) => {
                Some(PropertyKind::Readonly { default })
            }
            (None, readonly, Some(default)) => Some(PropertyKind::Lax {
                default,
                readonly: readonly == Some(Readonly::Lax),
            }),
            _ => {
                self.reject(
                    "A property should at least be readonly, required, or have a default value",
                );
                None
            }
        }
    }

    fn check_constant(&mut self) -> Option<ValueSource> {
        if !self.def.get(rules::CONSTANT).is_some_and(|r| r.is_literal(&Value::Bool(true))) {
            self.reject("Constant properties must have constant as 'true'");
        }

        let value = match self.def.get(rules::VALUE) {
            Some(Rule::Literal(value)) => Some(ValueSource::Literal(value.clone())),
            Some(Rule::Setter(setter)) => Some(ValueSource::Setter(setter.clone())),
            _ => {
                self.reject("Constant properties must have a value or setter");
                None
            }
        };

        if self.def.rule_names().any(|rule| !CONSTANT_RULES.contains(&rule)) {
            self.reject(
                "Constant properties can only have ('constant' & 'value') or 'onDelete' | 'onSuccess'",
            );
        }
        value
    }

    fn check_misplaced_rules(&mut self) {
        if self.has(rules::VALUE) {
            self.reject("Only constant properties can have 'value'");
        }
        if !self.has(rules::DEPENDENT) {
            for rule in [rules::DEPENDS_ON, rules::RESOLVER] {
                if self.has(rule) {
                    self.reject(format!("Only dependent properties can have '{rule}'"));
                }
            }
        }
        if !self.has(rules::VIRTUAL) {
            for rule in [rules::ALIAS, rules::SANITIZER] {
                if self.has(rule) {
                    self.reject(format!("Only virtual properties can have '{rule}'"));
                }
            }
        }
    }

    fn check_dependent(&mut self) -> Option<PropertyKind> {
        if !self.has(rules::DEPENDENT) {
            return None;
        }

        if !self.def.get(rules::DEPENDENT).is_some_and(|r| r.is_literal(&Value::Bool(true))) {
            self.reject("Dependent properties must have dependent as 'true'");
        }
        if !self.has(rules::DEFAULT) {
            self.reject("Dependent properties must have a default value");
        }
        let depends_on = self.depends_on();
        if depends_on.is_none() {
            self.reject("Dependent properties must depend on at least one property");
        }
        let resolver = match self.def.get(rules::RESOLVER) {
            Some(Rule::Setter(setter)) => Some(setter.clone()),
            _ => {
                self.reject("Dependent properties must have a resolver");
                None
            }
        };
        if self.has(rules::VALIDATOR) {
            self.reject("Dependent properties cannot be validated");
        }
        if self.has(rules::REQUIRED) {
            self.reject("Dependent properties cannot be required");
        }
        if self.def.get(rules::READONLY).is_some_and(|r| r.is_literal(&Value::from("lax"))) {
            self.reject("Dependent properties cannot be readonly 'lax'");
        }
        if self.has(rules::SHOULD_INIT) {
            self.reject("Dependent properties cannot have shouldInit rule");
        }
        if self.has(rules::SHOULD_UPDATE) {
            self.reject("Dependent properties cannot have shouldUpdate rule");
        }
        if self.has(rules::VIRTUAL) {
            self.reject("Dependent properties cannot be virtual");
        }

        let readonly = self
            .def
            .get(rules::READONLY)
            .is_some_and(|r| r.is_literal(&Value::Bool(true)));
        Some(PropertyKind::Dependent {
            default: self.default_source()?,
            depends_on: depends_on?,
            resolver: resolver?,
            readonly,
        })
    }

    /// `dependsOn` as a de-duplicated list of non-empty names.
    fn depends_on(&self) -> Option<Vec<String>> {
        let names: Vec<String> = match self.def.get(rules::DEPENDS_ON)?.literal()? {
            Value::String(name) => vec![name.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?,
            _ => return None,
        };
        if names.is_empty() || names.iter().any(String::is_empty) {
            return None;
        }
        let mut unique = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Some(unique)
    }

    fn check_readonly(&mut self) -> Option<Readonly> {
        let rule = self.def.get(rules::READONLY)?;
        let readonly = match rule.literal() {
            Some(Value::Bool(true)) => Readonly::Strict,
            Some(Value::String(s)) if s == "lax" => Readonly::Lax,
            _ => {
                self.reject("Readonly properties are either true | 'lax'");
                return None;
            }
        };

        if readonly == Readonly::Strict
            && self.def.get(rules::REQUIRED).is_some_and(|r| r.is_literal(&Value::Bool(true)))
        {
            self.reject("Strictly readonly properties are required only with a required function");
        }
        if !self.has(rules::DEFAULT) && !self.has(rules::DEPENDENT) && !self.has(rules::VIRTUAL) {
            self.reject("Readonly properties must have a default value");
        }
        if readonly == Readonly::Lax
            && self.def.get(rules::SHOULD_INIT).is_some_and(|r| r.is_literal(&Value::Bool(false)))
        {
            self.reject("Lax properties cannot have initialization blocked");
        }
        Some(readonly)
    }

    fn check_init_blocked(&mut self, readonly: Option<Readonly>) {
        let blocked = self
            .def
            .get(rules::SHOULD_INIT)
            .is_some_and(|r| r.is_literal(&Value::Bool(false)));
        if blocked
            && readonly.is_none()
            && !self.has(rules::DEFAULT)
            && !self.has(rules::REQUIRED)
            && !self.has(rules::DEPENDENT)
            && !self.has(rules::VIRTUAL)
        {
            self.reject("A property that should not be initialized must have a default value");
        }
    }

    fn check_required(&mut self, readonly: Option<Readonly>) -> Option<Required> {
        let required = match self.def.get(rules::REQUIRED) {
            None | Some(Rule::Literal(Value::Bool(false))) => None,
            Some(Rule::Literal(Value::Bool(true))) => Some(Required::Strict),
            Some(Rule::Predicate(predicate)) => Some(Required::By(predicate.clone())),
            Some(_) => {
                self.reject("Required must be a boolean or a function");
                None
            }
        };

        // Virtuals and dependents report their own required rules.
        let standalone = !self.has(rules::VIRTUAL) && !self.has(rules::DEPENDENT);
        match &required {
            Some(Required::Strict) if standalone => {
                if self.has(rules::DEFAULT) {
                    self.reject("Strictly required properties cannot have a default value");
                }
                if self.has(rules::READONLY) && readonly != Some(Readonly::Strict) {
                    self.reject("Strictly required properties cannot be readonly");
                }
                if self.has(rules::SHOULD_INIT) {
                    self.reject("Strictly required properties cannot have shouldInit rule");
                }
                if !self.has(rules::VALIDATOR) {
                    self.reject("Strictly required properties must have a validator");
                }
            }
            Some(Required::By(_)) if standalone => {
                if !self.has(rules::DEFAULT) {
                    self.reject("Callable required properties must have a default value");
                }
                if self.has(rules::SHOULD_INIT) {
                    self.reject("Callable required properties cannot have initialization blocked");
                }
            }
            _ => {}
        }

        if let Some(rule) = self.def.get(rules::REQUIRED_ERROR) {
            if !matches!(required, Some(Required::By(_))) {
                self.reject("'requiredError' is only valid with a required function");
            }
            let well_formed = matches!(rule, Rule::Setter(_))
                || matches!(rule.literal(), Some(Value::String(_)));
            if !well_formed {
                self.reject("'requiredError' must be a string or a setter");
            }
        }
        required
    }

    fn check_virtual(&mut self) -> Option<PropertyKind> {
        if !self.has(rules::VIRTUAL) {
            return None;
        }

        if !self.def.get(rules::VIRTUAL).is_some_and(|r| r.is_literal(&Value::Bool(true))) {
            self.reject("Virtuals must have virtual as 'true'");
        }
        if !self.has(rules::VALIDATOR) {
            self.reject("Virtuals must have a validator");
        }
        if self.def.rule_names().any(|rule| !VIRTUAL_RULES.contains(&rule)) {
            self.reject(format!(
                "Virtual properties can only have ({}) as rules",
                VIRTUAL_RULES.join(", ")
            ));
        }

        let alias = match self.def.get(rules::ALIAS) {
            None => None,
            Some(rule) => match rule.literal() {
                Some(Value::String(alias)) if !alias.trim().is_empty() => {
                    if alias == self.name {
                        self.reject("An alias cannot be the same as the virtual property");
                    }
                    Some(alias.clone())
                }
                _ => {
                    self.reject("An alias must be a string with at least 1 character");
                    None
                }
            },
        };

        let required = match self.def.get(rules::REQUIRED) {
            None | Some(Rule::Literal(Value::Bool(false))) => None,
            Some(Rule::Predicate(predicate)) => Some((predicate.clone(), self.required_error())),
            Some(_) => {
                self.reject("Virtuals can only be required by a function");
                None
            }
        };

        let sanitizer = match self.def.get(rules::SANITIZER) {
            None => None,
            Some(Rule::Sanitizer(sanitizer)) => Some(sanitizer.clone()),
            Some(_) => {
                self.reject("Invalid sanitizer");
                None
            }
        };

        Some(PropertyKind::Virtual {
            alias,
            sanitizer,
            required,
        })
    }

    fn check_handlers(&mut self) {
        for rule in rules::HANDLERS {
            let Some(payload) = self.def.get(rule) else {
                continue;
            };
            if !matches!(payload, Rule::Handlers(handlers) if !handlers.is_empty()) {
                self.reject(format!(
                    "'{rule}' must be a function or a non-empty array of functions"
                ));
            }
        }
        if self.has(rules::ON_FAILURE) && !self.has(rules::VALIDATOR) {
            self.reject(
                "'onFailure' can only be used with properties that support and have validators",
            );
        }
    }

    fn check_gates(&mut self) {
        for rule in [rules::SHOULD_INIT, rules::SHOULD_UPDATE] {
            let well_formed = match self.def.get(rule) {
                None => true,
                Some(Rule::Predicate(_)) => true,
                Some(other) => other.is_literal(&Value::Bool(false)),
            };
            if !well_formed {
                self.reject(format!("'{rule}' must either be 'false' or a function"));
            }
        }
    }

    fn check_types(&mut self) {
        if self.has(rules::VALIDATOR) && self.validator().is_none() {
            self.reject("Invalid validator");
        }
        if self.has(rules::DEFAULT) && self.default_source().is_none() {
            self.reject("Invalid default value");
        }
    }

    fn default_source(&self) -> Option<ValueSource> {
        match self.def.get(rules::DEFAULT)? {
            Rule::Literal(value) => Some(ValueSource::Literal(value.clone())),
            Rule::Setter(setter) => Some(ValueSource::Setter(setter.clone())),
            _ => None,
        }
    }

    fn required_error(&self) -> Option<RequiredError> {
        match self.def.get(rules::REQUIRED_ERROR)? {
            Rule::Literal(Value::String(message)) => Some(RequiredError::Literal(message.clone())),
            Rule::Setter(setter) => Some(RequiredError::Setter(setter.clone())),
            _ => None,
        }
    }

    fn validator(&self) -> Option<Validator> {
        match self.def.get(rules::VALIDATOR)? {
            Rule::Validator(validator) => Some(validator.clone()),
            _ => None,
        }
    }

    fn gate(&self, rule: &str) -> Option<Gate> {
        match self.def.get(rule)? {
            Rule::Predicate(predicate) => Some(Gate::When(predicate.clone())),
            Rule::Literal(Value::Bool(false)) => Some(Gate::Closed),
            _ => None,
        }
    }

    fn life_cycle(&self) -> LifeCycle {
        let handlers = |rule: &str| match self.def.get(rule) {
            Some(Rule::Handlers(handlers)) => handlers.clone(),
            _ => Vec::new(),
        };
        LifeCycle {
            on_create: handlers(rules::ON_CREATE),
            on_update: handlers(rules::ON_UPDATE),
            on_delete: handlers(rules::ON_DELETE),
            on_success: handlers(rules::ON_SUCCESS),
            on_failure: handlers(rules::ON_FAILURE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reasons(def: PropertyDefinition) -> Vec<String> {
        classify("prop", &def).err().unwrap_or_default()
    }

    fn category(def: PropertyDefinition) -> Category {
        classify("prop", &def).expect("definition should classify").category()
    }

    fn validator() -> Validator {
        Validator::new(|_, _| Ok(true))
    }

    #[test]
    fn lax_is_the_fallback_category() {
        assert_eq!(category(PropertyDefinition::new().default(1)), Category::Lax);
        assert_eq!(
            category(PropertyDefinition::new().default(1).readonly_lax()),
            Category::Lax
        );
    }

    #[test]
    fn readonly_required_by_is_its_own_category() {
        let def = PropertyDefinition::new()
            .default(0)
            .readonly()
            .required_by(Predicate::new(|_| Ok(true)));
        assert_eq!(category(def), Category::ReadonlyRequiredBy);
    }

    #[test]
    fn required_false_is_as_good_as_absent() {
        let def = PropertyDefinition::new().rule(rules::REQUIRED, false);
        assert_eq!(
            reasons(def),
            vec!["A property should at least be readonly, required, or have a default value"]
        );
    }

    #[test]
    fn unknown_rules_stop_classification() {
        let def = PropertyDefinition::new()
            .rule("zzz", true)
            .rule("aaa", true)
            .constant();
        assert_eq!(
            reasons(def),
            vec!["'aaa' is not a valid rule", "'zzz' is not a valid rule"]
        );
    }

    #[test]
    fn dependent_list_is_deduplicated() {
        let def = PropertyDefinition::new()
            .dependent()
            .default(0)
            .rule(rules::DEPENDS_ON, json!(["a", "a", "b"]))
            .resolver(Setter::new(|_| Ok(1)));
        let classified = classify("prop", &def).unwrap();
        assert_eq!(classified.depends_on(), ["a", "b"]);
    }

    #[test]
    fn depends_on_rejects_blank_names() {
        let def = PropertyDefinition::new()
            .dependent()
            .default(0)
            .rule(rules::DEPENDS_ON, json!(["a", ""]))
            .resolver(Setter::new(|_| Ok(1)));
        assert_eq!(
            reasons(def),
            vec!["Dependent properties must depend on at least one property"]
        );
    }

    #[test]
    fn gates_are_parsed() {
        let def = PropertyDefinition::new()
            .default(1)
            .validator(validator())
            .should_update(false)
            .should_init_when(Predicate::new(|_| Ok(true)));
        let classified = classify("prop", &def).unwrap();
        assert!(matches!(classified.should_update, Some(Gate::Closed)));
        assert!(matches!(classified.should_init, Some(Gate::When(_))));
    }
}
