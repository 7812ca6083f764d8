//! Error types for schema construction and entity operations.
//!
//! The two classes never mix: a [`SchemaError`] means the schema itself is
//! unusable and is always returned, while an [`OperationError`] describes one
//! entity that failed its contract and is returned as data unless the schema
//! runs in throw mode.

use crate::handler::Deferred;
use covenant_types::ErrorPayload;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

/// Result type for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Message carried by operation errors caused by invalid values.
pub const VALIDATION_ERROR: &str = "Validation Error";

/// Message carried by updates that changed nothing.
pub const NOTHING_TO_UPDATE: &str = "Nothing to update";

/// Errors raised while building a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// One or more property definitions (or schema options) were rejected.
    #[error("Invalid Schema")]
    Invalid { payload: ErrorPayload },

    /// Schema configuration parsed but holds an unusable value.
    #[error("invalid schema config: {0}")]
    Config(String),

    /// Schema configuration is not valid TOML.
    #[error("failed to parse schema config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Schema configuration could not be read.
    #[error("failed to read schema config: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    /// Returns the per-property reasons for an invalid schema.
    #[must_use]
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Self::Invalid { payload } => Some(payload),
            _ => None,
        }
    }

    /// Returns the reasons recorded against `key`, or an empty slice.
    #[must_use]
    pub fn reasons(&self, key: &str) -> &[String] {
        self.payload()
            .and_then(|p| p.get(key))
            .map(|e| e.reasons.as_slice())
            .unwrap_or_default()
    }
}

/// An entity operation that did not produce data.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
    pub payload: ErrorPayload,
}

impl OperationError {
    pub(crate) fn validation(payload: ErrorPayload) -> Self {
        Self {
            message: VALIDATION_ERROR.to_string(),
            payload,
        }
    }

    pub(crate) fn nothing_to_update() -> Self {
        Self {
            message: NOTHING_TO_UPDATE.to_string(),
            payload: ErrorPayload::new(),
        }
    }

    /// Returns the reasons recorded against `key`, or an empty slice.
    #[must_use]
    pub fn reasons(&self, key: &str) -> &[String] {
        self.payload
            .get(key)
            .map(|e| e.reasons.as_slice())
            .unwrap_or_default()
    }
}

/// An operation error returned as `Err` by a schema in throw mode.
///
/// Carries the `onFailure` handlers the failed operation queued, which would
/// otherwise be lost with the [`OperationResult`](crate::OperationResult).
/// Dereferences to the underlying [`OperationError`].
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ThrownError {
    pub error: OperationError,
    pub handle_failure: Deferred,
}

impl ThrownError {
    /// Drops the failure handlers and keeps the error.
    #[must_use]
    pub fn into_error(self) -> OperationError {
        self.error
    }
}

impl Deref for ThrownError {
    type Target = OperationError;

    fn deref(&self) -> &OperationError {
        &self.error
    }
}

impl From<ThrownError> for OperationError {
    fn from(thrown: ThrownError) -> Self {
        thrown.error
    }
}

/// A life-cycle handler returned an error (or panicked).
#[derive(Debug, Error)]
#[error("life-cycle handler for {} failed: {source}", .property.as_deref().unwrap_or("<schema>"))]
pub struct HandlerError {
    /// The property the handler belongs to; `None` for schema-wide handlers.
    pub property: Option<String>,
    #[source]
    pub source: anyhow::Error,
}
