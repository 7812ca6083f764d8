//! Schema-driven data contracts.
//!
//! A [`Schema`] is built from [`PropertyDefinition`]s. Construction classifies
//! every definition into exactly one [`Category`], checks the dependency graph
//! between dependent properties and virtual inputs, and fails as a whole with
//! a [`SchemaError`] if anything is incoherent. A valid schema hands out a
//! [`Model`], which creates, clones, updates and deletes entities:
//!
//! - defaults and constants are computed,
//! - supplied values are validated per property without failing fast,
//! - dependents are re-resolved in dependency order when their inputs change,
//! - life-cycle handlers come back as [`Deferred`] thunks.
//!
//! Entities are plain JSON records ([`Record`]); nothing is persisted.

mod callable;
mod classify;
mod context;
mod definition;
mod engine;
mod error;
mod graph;
mod handler;
mod options;
mod schema;

pub use callable::{Handler, Predicate, Sanitizer, Setter, Validation, Validator, Verdict};
pub use classify::Category;
pub use context::{Context, Operation};
pub use definition::{
    DefinitionShape, Definitions, PropertyDefinition, Rule, definitions_from_json, rules,
};
pub use engine::{DeleteOutcome, IntoRecord, Model, OperationResult};
pub use error::{
    HandlerError, NOTHING_TO_UPDATE, OperationError, SchemaError, SchemaResult, ThrownError,
    VALIDATION_ERROR,
};
pub use handler::Deferred;
pub use options::{ErrorMode, ExtensionOptions, Gate, SchemaOptions, Timestamps};
pub use schema::Schema;

pub use covenant_types::{ErrorPayload, PropertyError, Record, is_equal};
