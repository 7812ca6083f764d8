//! Shared test helpers for model tests.

#![allow(dead_code)]

use covenant_model::{
    Context, Handler, OperationResult, PropertyDefinition, Record, Schema, SchemaOptions,
    Setter, Validation, Validator,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema<const N: usize>(definitions: [(&str, PropertyDefinition); N]) -> Schema {
    schema_with(definitions, SchemaOptions::default())
}

pub fn schema_with<const N: usize>(
    definitions: [(&str, PropertyDefinition); N],
    options: SchemaOptions,
) -> Schema {
    init_tracing();
    Schema::new(definitions, options).expect("schema should be valid")
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record literal must be an object")
}

pub fn data(result: &OperationResult) -> &Record {
    result.data.as_ref().expect("operation should produce data")
}

/// Accepts anything.
pub fn any() -> Validator {
    Validator::new(|_, _| Ok(true))
}

/// Accepts numbers only.
pub fn number() -> Validator {
    Validator::new(|value: &Value, _: &Context| {
        Ok(if value.is_number() {
            Validation::valid()
        } else {
            Validation::invalid("Expected a number")
        })
    })
}

/// Accepts strings only, trimming them.
pub fn text() -> Validator {
    Validator::new(|value: &Value, _: &Context| {
        Ok(match value.as_str() {
            Some(s) => Validation::validated(s.trim()),
            None => Validation::invalid("Expected a string"),
        })
    })
}

/// `ctx[name] + delta`, treating a missing or non-integer value as 0.
pub fn plus(name: &'static str, delta: i64) -> Setter {
    Setter::new(move |ctx: &Context| Ok(ctx.get(name).and_then(Value::as_i64).unwrap_or(0) + delta))
}

/// Shared log for asserting handler order.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn handler(&self, entry: &str) -> Handler {
        let log = self.clone();
        let entry = entry.to_string();
        Handler::new(move |_| {
            log.0.lock().unwrap().push(entry.clone());
            Ok(())
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
