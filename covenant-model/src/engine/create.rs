//! `create` and `clone`.

use super::OperationResult;
use super::run::{Run, now, required_reason, route};
use crate::classify::PropertyKind;
use crate::context::Operation;
use crate::schema::ClassifiedSchema;
use covenant_types::Record;
use std::collections::BTreeSet;
use tracing::debug;

pub(super) async fn create(
    schema: &ClassifiedSchema,
    input: Record,
    options: Record,
) -> OperationResult {
    let input = route(schema, input);
    let mut run = Run::new(schema, Operation::Creation, Record::new(), None, options);
    run.seed_defaults().await;

    for property in schema.properties.values() {
        let name = property.name.as_str();
        match &property.kind {
            PropertyKind::Constant { .. } => {
                let value = run.constant_value(property).await;
                run.ctx.seed(name, value);
            }
            PropertyKind::Dependent { .. } => {}
            PropertyKind::Required => match input.properties.get(name) {
                Some(value) => run.accept(property, value.clone()).await,
                None => {
                    run.errors.add(name, required_reason(name));
                }
            },
            _ => {
                let Some(value) = input.properties.get(name) else {
                    continue;
                };
                if run.gate(property.should_init.as_ref(), name).await {
                    run.accept(property, value.clone()).await;
                } else {
                    debug!(property = name, "initialization blocked, keeping default");
                }
            }
        }
    }

    for property in schema.virtuals.values() {
        let name = property.name.as_str();
        let Some(value) = input.virtuals.get(name) else {
            continue;
        };
        if run.gate(property.should_init.as_ref(), name).await {
            run.accept_virtual(property, value.clone()).await;
        }
    }

    run.cascade(&BTreeSet::new()).await;
    finish_creation(schema, run).await
}

pub(super) async fn clone_entity(
    schema: &ClassifiedSchema,
    current: Record,
    reset: BTreeSet<String>,
    options: Record,
) -> OperationResult {
    let values: Record = current
        .iter()
        .filter(|(name, _)| schema.properties.contains_key(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let mut run = Run::new(schema, Operation::Creation, values, Some(current.clone()), options);
    let mut forced = BTreeSet::new();

    for property in schema.properties.values() {
        let name = property.name.as_str();
        let resetting = reset.contains(name);
        match &property.kind {
            PropertyKind::Constant { .. } => {
                if resetting || !current.contains_key(name) {
                    let value = run.constant_value(property).await;
                    run.ctx.seed(name, value);
                }
            }
            PropertyKind::Dependent { .. } => {
                if resetting || !current.contains_key(name) {
                    if let Some(default) = run.default_of(property).await {
                        run.ctx.seed(name, default);
                    }
                }
                if resetting {
                    forced.insert(name.to_string());
                }
            }
            PropertyKind::Required => match current.get(name) {
                Some(value) => {
                    if let Some(value) = run.validate(property, value.clone()).await {
                        run.ctx.seed(name, value);
                    }
                }
                None => {
                    run.errors.add(name, required_reason(name));
                }
            },
            _ => {
                let Some(default) = run.default_of(property).await else {
                    continue;
                };
                match current.get(name) {
                    _ if resetting => {
                        run.ctx.set(name, default);
                        run.changed.insert(name.to_string());
                    }
                    Some(value) => {
                        if let Some(value) = run.validate(property, value.clone()).await {
                            run.ctx.seed(name, value);
                        }
                    }
                    None => run.ctx.seed(name, default),
                }
            }
        }
    }

    run.cascade(&forced).await;
    finish_creation(schema, run).await
}

/// Shared tail of `create` and `clone`: required-by check, then the full
/// entity with fresh timestamps.
async fn finish_creation(schema: &ClassifiedSchema, mut run: Run<'_>) -> OperationResult {
    if !run.has_errors() {
        run.check_required_by().await;
    }
    if run.has_errors() {
        return run.failure();
    }

    let names: Vec<String> = schema.properties.keys().cloned().collect();
    let mut data = run.collect(&names);
    let timestamps = &schema.options.timestamps;
    if timestamps.is_enabled() {
        let stamp = now();
        for field in [&timestamps.created_at, &timestamps.updated_at].into_iter().flatten() {
            data.insert(field.clone(), stamp.clone());
        }
    }
    run.success(data, &names)
}
