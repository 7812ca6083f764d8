//! `delete`.

use super::DeleteOutcome;
use super::run::{Run, required_reason};
use crate::callable::Handler;
use crate::classify::PropertyKind;
use crate::context::{Context, Operation};
use crate::error::HandlerError;
use crate::schema::ClassifiedSchema;
use covenant_types::Record;
use tracing::warn;

pub(super) async fn delete(
    schema: &ClassifiedSchema,
    current: Record,
    options: Record,
) -> DeleteOutcome {
    let mut run = Run::new(
        schema,
        Operation::Deletion,
        current.clone(),
        Some(current.clone()),
        options,
    );

    for property in schema.properties.values() {
        let name = property.name.as_str();
        if matches!(property.kind, PropertyKind::Required) && !current.contains_key(name) {
            run.errors.add(name, required_reason(name));
        }
    }
    if run.has_errors() {
        return DeleteOutcome {
            error: Some(run.into_error()),
            handler_errors: Vec::new(),
        };
    }

    let context = run.ctx.snapshot();
    let mut handler_errors = Vec::new();
    for property in schema.properties.values() {
        run_all(
            &property.handlers.on_delete,
            Some(&property.name),
            &context,
            &mut handler_errors,
        )
        .await;
    }
    run_all(&schema.options.on_delete, None, &context, &mut handler_errors).await;

    DeleteOutcome {
        error: None,
        handler_errors,
    }
}

/// Awaits every handler; failures are collected and do not stop the rest.
async fn run_all(
    handlers: &[Handler],
    property: Option<&String>,
    context: &Context,
    errors: &mut Vec<HandlerError>,
) {
    for handler in handlers {
        if let Err(source) = handler.call(context.clone()).await {
            warn!(
                property = property.map_or("<schema>", String::as_str),
                error = %source,
                "onDelete handler failed"
            );
            errors.push(HandlerError {
                property: property.cloned(),
                source,
            });
        }
    }
}
