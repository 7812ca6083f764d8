//! Resolution core shared by every operation.
//!
//! A [`Run`] lives for exactly one operation. It owns the context overlay,
//! the error collector and the set of names that changed, and exposes the
//! steps operations are assembled from: defaults, validation, gates, the
//! dependent cascade and the required-by check.

use super::OperationResult;
use crate::callable::Validation;
use crate::classify::{ClassifiedProperty, PropertyKind, RequiredError, ValueSource};
use crate::context::{Context, ContextManager, Operation};
use crate::error::OperationError;
use crate::handler::Deferred;
use crate::options::Gate;
use crate::schema::ClassifiedSchema;
use chrono::{SecondsFormat, Utc};
use covenant_types::{ErrorCollector, Record, is_equal};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Reason recorded when a validator rejects without saying why.
pub(super) const INVALID_VALUE: &str = "Invalid value";

pub(super) fn required_reason(name: &str) -> String {
    format!("'{name}' is required")
}

/// Current instant as an RFC 3339 UTC string.
pub(super) fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Caller input split by destination.
pub(super) struct Input {
    pub(super) properties: Record,
    pub(super) virtuals: Record,
}

/// Routes input keys to properties and virtuals. Aliases fill in for their
/// virtual unless the virtual was also supplied by name; unknown keys are
/// dropped.
pub(super) fn route(schema: &ClassifiedSchema, input: Record) -> Input {
    let mut properties = Record::new();
    let mut virtuals = Record::new();
    let mut aliased = Vec::new();
    for (key, value) in input {
        if schema.virtuals.contains_key(&key) {
            virtuals.insert(key, value);
        } else if let Some(target) = schema.graph.virtual_for_alias(&key) {
            aliased.push((target.to_string(), value));
        } else if schema.properties.contains_key(&key) {
            properties.insert(key, value);
        } else {
            debug!(key = %key, "ignoring unknown input key");
        }
    }
    for (target, value) in aliased {
        virtuals.entry(target).or_insert(value);
    }
    Input {
        properties,
        virtuals,
    }
}

pub(super) struct Run<'s> {
    pub(super) schema: &'s ClassifiedSchema,
    pub(super) ctx: ContextManager,
    pub(super) errors: ErrorCollector,
    /// Properties and virtuals whose value changed during this run.
    pub(super) changed: BTreeSet<String>,
    /// Virtuals that were supplied and passed validation.
    pub(super) supplied_virtuals: BTreeSet<String>,
    defaults: BTreeMap<String, Value>,
    /// Snapshot taken before anything was resolved; default setters see this.
    initial: Context,
}

impl<'s> Run<'s> {
    pub(super) fn new(
        schema: &'s ClassifiedSchema,
        operation: Operation,
        values: Record,
        previous: Option<Record>,
        options: Record,
    ) -> Self {
        let mut ctx = ContextManager::new(operation, values, previous, options);
        let initial = ctx.snapshot();
        Self {
            schema,
            ctx,
            errors: ErrorCollector::new(),
            changed: BTreeSet::new(),
            supplied_virtuals: BTreeSet::new(),
            defaults: BTreeMap::new(),
            initial,
        }
    }

    // ── Values ───────────────────────────────────────────────────

    /// The property's default, computed once per run. `None` for kinds
    /// without one.
    pub(super) async fn default_of(&mut self, property: &ClassifiedProperty) -> Option<Value> {
        if let Some(value) = self.defaults.get(&property.name) {
            return Some(value.clone());
        }
        let value = match property.default()? {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::Setter(setter) => match setter.call(self.initial.clone()).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        property = %property.name,
                        error = %e,
                        "default setter failed, using null"
                    );
                    Value::Null
                }
            },
        };
        self.defaults.insert(property.name.clone(), value.clone());
        Some(value)
    }

    /// Seeds every property that has a default.
    pub(super) async fn seed_defaults(&mut self) {
        let schema = self.schema;
        for property in schema.properties.values() {
            if let Some(value) = self.default_of(property).await {
                self.ctx.seed(&property.name, value);
            }
        }
    }

    pub(super) async fn constant_value(&mut self, property: &ClassifiedProperty) -> Value {
        let PropertyKind::Constant { value } = &property.kind else {
            return Value::Null;
        };
        match value {
            ValueSource::Literal(value) => value.clone(),
            ValueSource::Setter(setter) => match setter.call(self.ctx.snapshot()).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        property = %property.name,
                        error = %e,
                        "constant setter failed, using null"
                    );
                    Value::Null
                }
            },
        }
    }

    /// Whether the entity's value of `property` still equals its default.
    /// A missing value counts as the default.
    pub(super) async fn is_at_default(&mut self, property: &ClassifiedProperty) -> bool {
        let Some(default) = self.default_of(property).await else {
            return false;
        };
        self.ctx
            .previous(&property.name)
            .is_none_or(|current| is_equal(current, &default))
    }

    // ── Validation ───────────────────────────────────────────────

    /// Runs the property's validator. Records the failure and returns `None`
    /// when the value is rejected.
    pub(super) async fn validate(
        &mut self,
        property: &ClassifiedProperty,
        value: Value,
    ) -> Option<Value> {
        let Some(validator) = &property.validator else {
            return Some(value);
        };
        match validator.call(value.clone(), self.ctx.snapshot()).await {
            Ok(Validation::Valid { validated }) => Some(validated.unwrap_or(value)),
            Ok(Validation::Invalid { reasons, metadata }) => {
                self.reject(&property.name, reasons, metadata);
                None
            }
            Err(e) => {
                warn!(property = %property.name, error = %e, "validator failed, rejecting value");
                self.reject(&property.name, Vec::new(), None);
                None
            }
        }
    }

    fn reject(&mut self, name: &str, reasons: Vec<String>, metadata: Option<Value>) {
        if reasons.is_empty() {
            self.errors.add(name, INVALID_VALUE);
        } else {
            self.errors.add_all(name, reasons);
        }
        if let Some(metadata) = metadata {
            self.errors.set_metadata(name, metadata);
        }
    }

    /// Validates a supplied value and records it as a change.
    pub(super) async fn accept(&mut self, property: &ClassifiedProperty, value: Value) {
        if let Some(value) = self.validate(property, value).await {
            self.ctx.set(&property.name, value);
            self.changed.insert(property.name.clone());
        }
    }

    /// Validates and sanitizes a virtual input, making it a cascade root.
    pub(super) async fn accept_virtual(&mut self, property: &ClassifiedProperty, value: Value) {
        let Some(mut value) = self.validate(property, value).await else {
            return;
        };
        if let PropertyKind::Virtual {
            sanitizer: Some(sanitizer),
            ..
        } = &property.kind
        {
            match sanitizer.call(value.clone(), self.ctx.snapshot()).await {
                Ok(sanitized) => value = sanitized,
                Err(e) => {
                    warn!(
                        property = %property.name,
                        error = %e,
                        "sanitizer failed, keeping validated value"
                    );
                }
            }
        }
        self.ctx.set(&property.name, value);
        self.changed.insert(property.name.clone());
        self.supplied_virtuals.insert(property.name.clone());
    }

    /// Evaluates an optional gate; no gate means allowed.
    pub(super) async fn gate(&mut self, gate: Option<&Gate>, subject: &str) -> bool {
        match gate {
            None => true,
            Some(gate) => gate.allows(self.ctx.snapshot(), subject).await,
        }
    }

    // ── Cascade ──────────────────────────────────────────────────

    /// Re-resolves dependents, in resolution order, whose inputs changed.
    ///
    /// `forced` dependents resolve regardless of their inputs. Each dependent
    /// resolves at most once; a result equal to its current value does not
    /// propagate.
    pub(super) async fn cascade(&mut self, forced: &BTreeSet<String>) {
        let schema = self.schema;
        for name in schema.graph.order() {
            let Some(property) = schema.properties.get(name) else {
                continue;
            };
            let PropertyKind::Dependent {
                resolver, readonly, ..
            } = &property.kind
            else {
                continue;
            };

            let triggered = forced.contains(name)
                || property.depends_on().iter().any(|d| self.changed.contains(d));
            if !triggered {
                continue;
            }
            if *readonly
                && self.ctx.operation() == Operation::Update
                && !self.is_at_default(property).await
            {
                debug!(property = %name, "readonly dependent already set, not resolving");
                continue;
            }

            let value = match resolver.call(self.ctx.snapshot()).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(property = %name, error = %e, "resolver failed, using null");
                    Value::Null
                }
            };
            let changed = !self.ctx.get(name).is_some_and(|current| is_equal(current, &value));
            debug!(property = %name, changed, "resolved dependent");
            if changed {
                self.ctx.set(name, value);
                self.changed.insert(name.clone());
            }
        }
    }

    // ── Required-by ──────────────────────────────────────────────

    /// Evaluates every required-by predicate against the in-flight context.
    ///
    /// A predicate that fails, or answers something other than a verdict,
    /// means "not required".
    pub(super) async fn check_required_by(&mut self) {
        let schema = self.schema;
        let mut candidates: Vec<&ClassifiedProperty> = schema
            .properties
            .values()
            .chain(schema.virtuals.values())
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        for property in candidates {
            let (predicate, error) = match &property.kind {
                PropertyKind::RequiredBy {
                    predicate, error, ..
                } => (predicate, error.as_ref()),
                PropertyKind::Virtual {
                    required: Some((predicate, error)),
                    ..
                } => (predicate, error.as_ref()),
                _ => continue,
            };
            if self.errors.has(&property.name) {
                continue;
            }

            let verdict = match predicate.call(self.ctx.snapshot()).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(
                        property = %property.name,
                        error = %e,
                        "required predicate failed, treating as not required"
                    );
                    continue;
                }
            };
            if !verdict.pass || !self.is_missing(property).await {
                continue;
            }

            let reason = self.required_message(property, verdict.message, error).await;
            self.errors.add(property.name.as_str(), reason);
        }
    }

    async fn is_missing(&mut self, property: &ClassifiedProperty) -> bool {
        if property.is_virtual() {
            return !self.supplied_virtuals.contains(&property.name);
        }
        let Some(value) = self.ctx.get(&property.name).cloned() else {
            return true;
        };
        self.default_of(property)
            .await
            .is_none_or(|default| is_equal(&value, &default))
    }

    async fn required_message(
        &mut self,
        property: &ClassifiedProperty,
        message: Option<String>,
        error: Option<&RequiredError>,
    ) -> String {
        if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
            return message;
        }
        match error {
            Some(RequiredError::Literal(message)) if !message.trim().is_empty() => message.clone(),
            Some(RequiredError::Setter(setter)) => {
                match setter.call(self.ctx.snapshot()).await {
                    Ok(Value::String(message)) if !message.trim().is_empty() => message,
                    Ok(_) => required_reason(&property.name),
                    Err(e) => {
                        warn!(property = %property.name, error = %e, "requiredError setter failed");
                        required_reason(&property.name)
                    }
                }
            }
            _ => required_reason(&property.name),
        }
    }

    // ── Outcome ──────────────────────────────────────────────────

    /// The current values of `names`, skipping absent ones.
    pub(super) fn collect(&self, names: &[String]) -> Record {
        names
            .iter()
            .filter_map(|name| self.ctx.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    pub(super) fn has_errors(&self) -> bool {
        self.errors.is_payload_loaded()
    }

    /// Consumes the run into its accumulated validation error.
    pub(super) fn into_error(self) -> OperationError {
        OperationError::validation(self.errors.into_payload())
    }

    /// A failed outcome: no data, the error payload, and the `onFailure`
    /// handlers of every property that failed.
    pub(super) fn failure(mut self) -> OperationResult {
        let schema = self.schema;
        let mut handle_failure = Deferred::new(self.ctx.snapshot());
        for name in self.errors.keys() {
            if let Some(property) = schema.get(name) {
                handle_failure.push(Some(name), &property.handlers.on_failure);
            }
        }
        OperationResult {
            data: None,
            error: Some(self.into_error()),
            handle_success: Deferred::empty(),
            handle_failure,
        }
    }

    /// A successful outcome. `names` are the properties the operation
    /// produced; each runs its `onCreate` (creation) or `onUpdate` handlers,
    /// then its `onSuccess` handlers.
    pub(super) fn success(mut self, data: Record, names: &[String]) -> OperationResult {
        let schema = self.schema;
        let creating = self.ctx.operation() == Operation::Creation;
        let mut handle_success = Deferred::new(self.ctx.snapshot());
        for name in names {
            let Some(property) = schema.properties.get(name) else {
                continue;
            };
            let handlers = &property.handlers;
            let phase = if creating {
                &handlers.on_create
            } else {
                &handlers.on_update
            };
            handle_success.push(Some(name.as_str()), phase);
            handle_success.push(Some(name.as_str()), &handlers.on_success);
        }
        for name in &self.supplied_virtuals {
            if let Some(property) = schema.virtuals.get(name) {
                handle_success.push(Some(name.as_str()), &property.handlers.on_success);
            }
        }
        handle_success.push(None, &schema.options.on_success);

        OperationResult {
            data: Some(data),
            error: None,
            handle_success,
            handle_failure: Deferred::empty(),
        }
    }
}
