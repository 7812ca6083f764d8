//! Per-operation context.
//!
//! A [`Context`] is a frozen snapshot handed to every user callable. It has
//! no mutating API, and each callable receives its own clone, so nothing a
//! handler does can leak into later resolution. The engine-side
//! [`ContextManager`] owns the live values and hands out snapshots, rebuilding
//! one only after a value changed.

use covenant_types::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The kind of operation a context belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// `create` and `clone`.
    Creation,
    Update,
    Deletion,
}

#[derive(Debug)]
struct Snapshot {
    values: Record,
    changes: Record,
    previous: Option<Arc<Record>>,
    options: Arc<Record>,
    operation: Operation,
}

/// Read-only view of an entity in the middle of an operation.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Snapshot>,
}

impl Context {
    /// Returns the current value of `key`, including values resolved earlier
    /// in this operation.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.values.get(key)
    }

    /// All current values, including validated virtual inputs.
    #[must_use]
    pub fn values(&self) -> &Record {
        &self.inner.values
    }

    /// Values set or resolved so far in this operation.
    #[must_use]
    pub fn changes(&self) -> &Record {
        &self.inner.changes
    }

    /// The entity as it was before the operation (update, clone, delete).
    #[must_use]
    pub fn previous_values(&self) -> Option<&Record> {
        self.inner.previous.as_deref()
    }

    /// The value of `key` before the operation.
    #[must_use]
    pub fn previous(&self, key: &str) -> Option<&Value> {
        self.previous_values().and_then(|p| p.get(key))
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        self.inner.operation
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.inner.operation == Operation::Update
    }

    /// Options supplied by the caller of the operation.
    #[must_use]
    pub fn options(&self) -> &Record {
        &self.inner.options
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.inner.options.get(key)
    }
}

/// Owns the live values of one operation.
#[derive(Debug)]
pub(crate) struct ContextManager {
    values: Record,
    changes: Record,
    previous: Option<Arc<Record>>,
    options: Arc<Record>,
    operation: Operation,
    cached: Option<Context>,
}

impl ContextManager {
    pub(crate) fn new(
        operation: Operation,
        values: Record,
        previous: Option<Record>,
        options: Record,
    ) -> Self {
        Self {
            values,
            changes: Record::new(),
            previous: previous.map(Arc::new),
            options: Arc::new(options),
            operation,
            cached: None,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub(crate) fn previous(&self, key: &str) -> Option<&Value> {
        self.previous.as_deref().and_then(|p| p.get(key))
    }

    pub(crate) fn operation(&self) -> Operation {
        self.operation
    }

    /// Sets a value that was not produced by this operation (defaults,
    /// copied values).
    pub(crate) fn seed(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
        self.cached = None;
    }

    /// Records a value produced by this operation.
    pub(crate) fn set(&mut self, key: &str, value: Value) {
        self.changes.insert(key.to_string(), value.clone());
        self.values.insert(key.to_string(), value);
        self.cached = None;
    }

    /// Returns a frozen snapshot of the current state.
    pub(crate) fn snapshot(&mut self) -> Context {
        if let Some(ctx) = &self.cached {
            return ctx.clone();
        }
        let ctx = Context {
            inner: Arc::new(Snapshot {
                values: self.values.clone(),
                changes: self.changes.clone(),
                previous: self.previous.clone(),
                options: Arc::clone(&self.options),
                operation: self.operation,
            }),
        };
        self.cached = Some(ctx.clone());
        ctx
    }
}
