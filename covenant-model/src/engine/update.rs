//! `update`.

use super::OperationResult;
use super::run::{Run, now, route};
use crate::classify::{ClassifiedProperty, PropertyKind};
use crate::context::Operation;
use crate::error::OperationError;
use crate::handler::Deferred;
use crate::schema::ClassifiedSchema;
use covenant_types::{Record, is_equal};
use std::collections::BTreeSet;
use tracing::debug;

pub(super) async fn update(
    schema: &ClassifiedSchema,
    current: Record,
    changes: Record,
    options: Record,
) -> OperationResult {
    let values: Record = current
        .iter()
        .filter(|(name, _)| schema.properties.contains_key(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let mut run = Run::new(schema, Operation::Update, values, Some(current), options);

    let snapshot = run.ctx.snapshot();
    if !schema.options.should_update.allows(snapshot, "schema").await {
        debug!("schema-level shouldUpdate refused the update");
        return nothing_to_update();
    }

    let input = route(schema, changes);
    for property in schema.properties.values() {
        let name = property.name.as_str();
        let Some(value) = input.properties.get(name) else {
            continue;
        };
        if !is_updatable(&mut run, property).await {
            debug!(property = name, "not updatable, ignoring change");
            continue;
        }
        if !run.gate(property.should_update.as_ref(), name).await {
            continue;
        }
        let Some(value) = run.validate(property, value.clone()).await else {
            continue;
        };
        if run.ctx.previous(name).is_some_and(|current| is_equal(current, &value)) {
            continue;
        }
        run.ctx.set(name, value);
        run.changed.insert(name.to_string());
    }

    for property in schema.virtuals.values() {
        let name = property.name.as_str();
        let Some(value) = input.virtuals.get(name) else {
            continue;
        };
        if run.gate(property.should_update.as_ref(), name).await {
            run.accept_virtual(property, value.clone()).await;
        }
    }

    run.cascade(&BTreeSet::new()).await;
    if run.has_errors() {
        return run.failure();
    }

    let changed: Vec<String> = run
        .changed
        .iter()
        .filter(|name| schema.properties.contains_key(*name))
        .cloned()
        .collect();
    if changed.is_empty() {
        return nothing_to_update();
    }

    run.check_required_by().await;
    if run.has_errors() {
        return run.failure();
    }

    let mut data = run.collect(&changed);
    if let Some(field) = &schema.options.timestamps.updated_at {
        data.insert(field.clone(), now());
    }
    run.success(data, &changed)
}

async fn is_updatable(run: &mut Run<'_>, property: &ClassifiedProperty) -> bool {
    match &property.kind {
        PropertyKind::Constant { .. }
        | PropertyKind::Dependent { .. }
        | PropertyKind::Readonly { .. } => false,
        PropertyKind::Lax { readonly: true, .. }
        | PropertyKind::RequiredBy { readonly: true, .. } => run.is_at_default(property).await,
        PropertyKind::Lax { .. }
        | PropertyKind::Required
        | PropertyKind::RequiredBy { .. }
        | PropertyKind::Virtual { .. } => true,
    }
}

fn nothing_to_update() -> OperationResult {
    OperationResult {
        data: None,
        error: Some(OperationError::nothing_to_update()),
        handle_success: Deferred::empty(),
        handle_failure: Deferred::empty(),
    }
}
