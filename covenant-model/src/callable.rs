//! User-supplied callables: setters, predicates, validators, sanitizers and
//! life-cycle handlers.
//!
//! Every callable is stored as one uniform async function type. Synchronous
//! closures are adapted once, at construction, through `new`; asynchronous
//! ones go through `from_async`. The engine never inspects what a callable
//! returns beyond its declared type.
//!
//! Calls are guarded: a callable that returns `Err` or panics yields an
//! `Err` to the engine, which then applies the rule's fallback.

use crate::context::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

type SetterFn = dyn Fn(Context) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
type PredicateFn = dyn Fn(Context) -> BoxFuture<'static, anyhow::Result<Verdict>> + Send + Sync;
type ValidatorFn =
    dyn Fn(Value, Context) -> BoxFuture<'static, anyhow::Result<Validation>> + Send + Sync;
type SanitizerFn =
    dyn Fn(Value, Context) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
type HandlerFn = dyn Fn(Context) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Runs `call`, turning a panic (while building the future or while polling
/// it) into an `Err`.
fn guarded<T: Send + 'static>(
    call: impl FnOnce() -> BoxFuture<'static, anyhow::Result<T>>,
) -> BoxFuture<'static, anyhow::Result<T>> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(future) => AssertUnwindSafe(future)
            .catch_unwind()
            .map(|outcome| outcome.unwrap_or_else(|panic| Err(panic_error(panic))))
            .boxed(),
        Err(panic) => {
            let error = panic_error(panic);
            async move { Err(error) }.boxed()
        }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow::anyhow!("callback panicked: {message}")
}

// ── Verdict ──────────────────────────────────────────────────────

/// The answer of a predicate rule (`required`, `shouldInit`, `shouldUpdate`).
///
/// Only `required` predicates use `message`: it becomes the error reason when
/// the property turns out to be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub pass: bool,
    pub message: Option<String>,
}

impl Verdict {
    #[must_use]
    pub fn yes() -> Self {
        Self {
            pass: true,
            message: None,
        }
    }

    #[must_use]
    pub fn no() -> Self {
        Self::default()
    }

    /// A passing verdict carrying a message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            message: Some(message.into()),
        }
    }

    /// Interprets a loosely-typed predicate answer.
    ///
    /// `true`/`false` and `[bool, string]` are understood; anything else is a
    /// failing verdict, so a predicate that answers garbage means "not required".
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(pass) => (*pass).into(),
            Value::Array(items) => match items.as_slice() {
                [Value::Bool(pass), Value::String(message)] => Self {
                    pass: *pass,
                    message: Some(message.clone()),
                },
                [Value::Bool(pass), _] => (*pass).into(),
                _ => Self::no(),
            },
            _ => Self::no(),
        }
    }
}

impl From<bool> for Verdict {
    fn from(pass: bool) -> Self {
        Self {
            pass,
            message: None,
        }
    }
}

impl From<(bool, &str)> for Verdict {
    fn from((pass, message): (bool, &str)) -> Self {
        Self {
            pass,
            message: Some(message.to_string()),
        }
    }
}

impl From<(bool, String)> for Verdict {
    fn from((pass, message): (bool, String)) -> Self {
        Self {
            pass,
            message: Some(message),
        }
    }
}

impl From<Value> for Verdict {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

// ── Validation ───────────────────────────────────────────────────

/// The answer of a validator.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The value is acceptable. `validated` replaces the input when present.
    Valid { validated: Option<Value> },
    /// The value is rejected.
    Invalid {
        reasons: Vec<String>,
        metadata: Option<Value>,
    },
}

impl Validation {
    /// Accepts the value unchanged.
    #[must_use]
    pub fn valid() -> Self {
        Self::Valid { validated: None }
    }

    /// Accepts the value, replacing it with `validated`.
    #[must_use]
    pub fn validated(validated: impl Into<Value>) -> Self {
        Self::Valid {
            validated: Some(validated.into()),
        }
    }

    /// Rejects the value with one reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reasons: vec![reason.into()],
            metadata: None,
        }
    }

    /// Rejects the value with several reasons.
    #[must_use]
    pub fn invalid_with<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Invalid {
            reasons: reasons.into_iter().map(Into::into).collect(),
            metadata: None,
        }
    }

    /// Attaches metadata to a rejection. No effect on a valid answer.
    #[must_use]
    pub fn with_metadata(self, metadata: Value) -> Self {
        match self {
            Self::Invalid { reasons, .. } => Self::Invalid {
                reasons,
                metadata: Some(metadata),
            },
            valid => valid,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

impl From<bool> for Validation {
    fn from(valid: bool) -> Self {
        if valid {
            Self::valid()
        } else {
            Self::Invalid {
                reasons: Vec::new(),
                metadata: None,
            }
        }
    }
}

// ── Callables ────────────────────────────────────────────────────

/// Computes a value from the operation context: defaults, constant values,
/// dependent resolvers and required-error messages.
#[derive(Clone)]
pub struct Setter(Arc<SetterFn>);

impl Setter {
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self(Arc::new(move |ctx: Context| {
            let out: anyhow::Result<Value> = f(&ctx).map(Into::into);
            async move { out }.boxed()
        }))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Context| f(ctx).boxed()))
    }

    pub(crate) fn call(&self, ctx: Context) -> BoxFuture<'static, anyhow::Result<Value>> {
        guarded(|| (self.0)(ctx))
    }
}

/// Answers a yes/no question about the operation context.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<V> + Send + Sync + 'static,
        V: Into<Verdict>,
    {
        Self(Arc::new(move |ctx: Context| {
            let out: anyhow::Result<Verdict> = f(&ctx).map(Into::into);
            async move { out }.boxed()
        }))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Verdict>> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Context| f(ctx).boxed()))
    }

    pub(crate) fn call(&self, ctx: Context) -> BoxFuture<'static, anyhow::Result<Verdict>> {
        guarded(|| (self.0)(ctx))
    }
}

/// Checks (and optionally normalizes) a supplied value.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorFn>);

impl Validator {
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn(&Value, &Context) -> anyhow::Result<V> + Send + Sync + 'static,
        V: Into<Validation>,
    {
        Self(Arc::new(move |value: Value, ctx: Context| {
            let out: anyhow::Result<Validation> = f(&value, &ctx).map(Into::into);
            async move { out }.boxed()
        }))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Validation>> + Send + 'static,
    {
        Self(Arc::new(move |value: Value, ctx: Context| f(value, ctx).boxed()))
    }

    pub(crate) fn call(
        &self,
        value: Value,
        ctx: Context,
    ) -> BoxFuture<'static, anyhow::Result<Validation>> {
        guarded(|| (self.0)(value, ctx))
    }
}

/// Transforms a validated virtual value before resolvers see it.
#[derive(Clone)]
pub struct Sanitizer(Arc<SanitizerFn>);

impl Sanitizer {
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn(&Value, &Context) -> anyhow::Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self(Arc::new(move |value: Value, ctx: Context| {
            let out: anyhow::Result<Value> = f(&value, &ctx).map(Into::into);
            async move { out }.boxed()
        }))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(move |value: Value, ctx: Context| f(value, ctx).boxed()))
    }

    pub(crate) fn call(
        &self,
        value: Value,
        ctx: Context,
    ) -> BoxFuture<'static, anyhow::Result<Value>> {
        guarded(|| (self.0)(value, ctx))
    }
}

/// A life-cycle side effect (`onCreate`, `onUpdate`, `onDelete`,
/// `onSuccess`, `onFailure`).
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx: Context| {
            let out = f(&ctx);
            async move { out }.boxed()
        }))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Context| f(ctx).boxed()))
    }

    pub(crate) fn call(&self, ctx: Context) -> BoxFuture<'static, anyhow::Result<()>> {
        guarded(|| (self.0)(ctx))
    }
}

macro_rules! opaque_debug {
    ($($ty:ident),*) => {
        $(impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($ty), "(..)"))
            }
        })*
    };
}

opaque_debug!(Setter, Predicate, Validator, Sanitizer, Handler);
