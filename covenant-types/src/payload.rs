//! Per-property error accumulation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reasons (and optional metadata) recorded against one property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyError {
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Errors keyed by property name, sorted for stable output.
pub type ErrorPayload = BTreeMap<String, PropertyError>;

/// Collects reasons per key without failing fast.
///
/// Duplicate reasons for the same key are dropped, so the same failure
/// reported from two code paths shows up once.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    payload: ErrorPayload,
}

impl ErrorCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one reason against `key`.
    pub fn add(&mut self, key: impl Into<String>, reason: impl Into<String>) -> &mut Self {
        let reason = reason.into();
        let entry = self.payload.entry(key.into()).or_default();
        if !entry.reasons.contains(&reason) {
            entry.reasons.push(reason);
        }
        self
    }

    /// Records several reasons against `key`, in order.
    pub fn add_all<I, S>(&mut self, key: impl Into<String>, reasons: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        for reason in reasons {
            self.add(key.clone(), reason);
        }
        self
    }

    /// Attaches metadata to `key`. Later metadata replaces earlier metadata.
    pub fn set_metadata(&mut self, key: impl Into<String>, metadata: Value) -> &mut Self {
        self.payload.entry(key.into()).or_default().metadata = Some(metadata);
        self
    }

    /// Returns true once at least one key has been recorded.
    #[must_use]
    pub fn is_payload_loaded(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Returns true if `key` has at least one recorded reason.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }

    /// Returns the keys recorded so far.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.payload.keys().map(String::as_str)
    }

    /// Borrows the accumulated payload.
    #[must_use]
    pub fn payload(&self) -> &ErrorPayload {
        &self.payload
    }

    /// Consumes the collector, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> ErrorPayload {
        self.payload
    }
}
