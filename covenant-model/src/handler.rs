//! Deferred life-cycle work.

use crate::callable::Handler;
use crate::context::Context;
use crate::error::HandlerError;
use tracing::warn;

#[derive(Debug)]
struct Job {
    property: Option<String>,
    handler: Handler,
}

/// Life-cycle handlers queued by an operation, run only when the caller
/// asks for them.
///
/// Consumed by [`Deferred::run`], so the same handlers can never run twice.
/// Handlers run in queue order with the context the operation finished with;
/// the first failure stops the rest.
#[derive(Debug, Default)]
#[must_use = "deferred handlers do nothing unless run"]
pub struct Deferred {
    jobs: Vec<Job>,
    context: Option<Context>,
}

impl Deferred {
    /// A thunk with nothing to run.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(context: Context) -> Self {
        Self {
            jobs: Vec::new(),
            context: Some(context),
        }
    }

    /// Queues `handlers`; `property` is `None` for schema-wide handlers.
    pub(crate) fn push(&mut self, property: Option<&str>, handlers: &[Handler]) {
        self.jobs.extend(handlers.iter().map(|handler| Job {
            property: property.map(str::to_string),
            handler: handler.clone(),
        }));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Runs every queued handler in order.
    pub async fn run(self) -> Result<(), HandlerError> {
        let Some(context) = self.context else {
            return Ok(());
        };
        for job in self.jobs {
            if let Err(source) = job.handler.call(context.clone()).await {
                warn!(
                    property = job.property.as_deref().unwrap_or("<schema>"),
                    error = %source,
                    "life-cycle handler failed"
                );
                return Err(HandlerError {
                    property: job.property,
                    source,
                });
            }
        }
        Ok(())
    }
}
