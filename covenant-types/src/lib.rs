//! Shared value types for covenant.
//!
//! This crate defines the plain-data collaborators the contract engine is
//! built on:
//! - [`Record`]: an entity as a JSON object
//! - [`is_equal`]: structural equality used to decide whether a value changed
//! - [`ErrorCollector`]: accumulates per-property reasons into an [`ErrorPayload`]
//!
//! Nothing here knows about schemas or rules; those live in `covenant-model`.

mod equality;
mod payload;

pub use equality::{is_equal, is_equal_record};
pub use payload::{ErrorCollector, ErrorPayload, PropertyError};

/// An entity's values keyed by property name.
pub type Record = serde_json::Map<String, serde_json::Value>;
