//! The operation engine.
//!
//! Every operation runs to completion before returning. Validation failures
//! are collected per property into the result's `error`; in throw mode the
//! same error comes back as `Err` instead, still carrying its failure
//! handlers. Success and failure handlers are never run inline: they are
//! handed back as [`Deferred`] thunks.

mod create;
mod delete;
mod run;
mod update;

use crate::classify::PropertyKind;
use crate::context::Operation;
use crate::error::{HandlerError, OperationError, ThrownError};
use crate::handler::Deferred;
use crate::options::ErrorMode;
use crate::schema::ClassifiedSchema;
use covenant_types::{ErrorCollector, Record};
use run::Run;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The outcome of `create`, `clone` and `update`.
#[derive(Debug)]
#[must_use]
pub struct OperationResult {
    /// The resulting values; `None` whenever `error` is set.
    pub data: Option<Record>,
    pub error: Option<OperationError>,
    /// Success-path handlers (empty on failure).
    pub handle_success: Deferred,
    /// `onFailure` handlers of the properties that failed (empty on success).
    pub handle_failure: Deferred,
}

impl OperationResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The outcome of `delete`.
#[derive(Debug, Default)]
#[must_use]
pub struct DeleteOutcome {
    pub error: Option<OperationError>,
    /// `onDelete` handlers that failed; the others still ran.
    pub handler_errors: Vec<HandlerError>,
}

/// Anything an operation accepts as entity values or caller options.
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

impl IntoRecord for &Record {
    fn into_record(self) -> Record {
        self.clone()
    }
}

/// JSON objects become records; any other value is an empty record.
impl IntoRecord for Value {
    fn into_record(self) -> Record {
        match self {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }
}

/// Creates, clones, updates and deletes entities of one schema.
///
/// Cheap to clone. The classified schema is shared and read-only, so any
/// number of operations may run concurrently on clones of the same model.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<ClassifiedSchema>,
}

impl Model {
    pub(crate) fn new(schema: Arc<ClassifiedSchema>) -> Self {
        Self { schema }
    }

    pub async fn create(&self, input: impl IntoRecord) -> Result<OperationResult, ThrownError> {
        self.create_with(input, Record::new()).await
    }

    /// Builds a new entity from `input`; `options` are visible to callables.
    pub async fn create_with(
        &self,
        input: impl IntoRecord,
        options: impl IntoRecord,
    ) -> Result<OperationResult, ThrownError> {
        let result =
            create::create(&self.schema, input.into_record(), options.into_record()).await;
        self.settle(result)
    }

    pub async fn clone_entity<I, S>(
        &self,
        current: impl IntoRecord,
        reset: I,
    ) -> Result<OperationResult, ThrownError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clone_with(current, reset, Record::new()).await
    }

    /// Builds a copy of `current`. Properties named in `reset` go back to
    /// their default first (constants are recomputed, dependents re-resolved).
    pub async fn clone_with<I, S>(
        &self,
        current: impl IntoRecord,
        reset: I,
        options: impl IntoRecord,
    ) -> Result<OperationResult, ThrownError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reset: BTreeSet<String> = reset.into_iter().map(Into::into).collect();
        let result = create::clone_entity(
            &self.schema,
            current.into_record(),
            reset,
            options.into_record(),
        )
        .await;
        self.settle(result)
    }

    pub async fn update(
        &self,
        current: impl IntoRecord,
        changes: impl IntoRecord,
    ) -> Result<OperationResult, ThrownError> {
        self.update_with(current, changes, Record::new()).await
    }

    /// Applies `changes` to `current`. `data` holds only what changed.
    pub async fn update_with(
        &self,
        current: impl IntoRecord,
        changes: impl IntoRecord,
        options: impl IntoRecord,
    ) -> Result<OperationResult, ThrownError> {
        let result = update::update(
            &self.schema,
            current.into_record(),
            changes.into_record(),
            options.into_record(),
        )
        .await;
        self.settle(result)
    }

    pub async fn delete(&self, current: impl IntoRecord) -> Result<DeleteOutcome, OperationError> {
        self.delete_with(current, Record::new()).await
    }

    /// Checks `current` still has its required values, then awaits every
    /// `onDelete` handler.
    pub async fn delete_with(
        &self,
        current: impl IntoRecord,
        options: impl IntoRecord,
    ) -> Result<DeleteOutcome, OperationError> {
        let outcome =
            delete::delete(&self.schema, current.into_record(), options.into_record()).await;
        match (&outcome.error, self.schema.options.errors) {
            (Some(error), ErrorMode::Throw) => Err(error.clone()),
            _ => Ok(outcome),
        }
    }

    /// Validates one value against a property, virtual or alias, outside any
    /// operation. Constants and dependents cannot be set, so they are
    /// reported as invalid properties.
    pub async fn validate(
        &self,
        property: &str,
        value: Value,
        options: impl IntoRecord,
    ) -> Result<Value, OperationError> {
        let schema = &*self.schema;
        let target = schema.graph.virtual_for_alias(property).unwrap_or(property);
        let settable = schema.get(target).filter(|p| {
            !matches!(
                p.kind,
                PropertyKind::Constant { .. } | PropertyKind::Dependent { .. }
            )
        });
        let Some(settable) = settable else {
            let mut errors = ErrorCollector::new();
            errors.add(property, "Invalid property");
            return Err(OperationError::validation(errors.into_payload()));
        };

        let mut run = Run::new(
            schema,
            Operation::Creation,
            Record::new(),
            None,
            options.into_record(),
        );
        match run.validate(settable, value).await {
            Some(validated) => Ok(validated),
            None => Err(run.into_error()),
        }
    }

    /// Default values of every property that has one, resolved against an
    /// empty creation context.
    pub async fn defaults(&self) -> Record {
        let schema = &*self.schema;
        let mut run = Run::new(schema, Operation::Creation, Record::new(), None, Record::new());
        let mut defaults = Record::new();
        for property in schema.properties.values() {
            if let Some(value) = run.default_of(property).await {
                defaults.insert(property.name.clone(), value);
            }
        }
        defaults
    }

    fn settle(&self, result: OperationResult) -> Result<OperationResult, ThrownError> {
        match result {
            OperationResult {
                error: Some(error),
                handle_failure,
                ..
            } if self.schema.options.errors == ErrorMode::Throw => Err(ThrownError {
                error,
                handle_failure,
            }),
            result => Ok(result),
        }
    }
}
