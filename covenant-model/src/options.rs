//! Schema-wide options, and loading them from `schema.toml`.
//!
//! Literal settings (error mode, timestamps, a literal update gate) can come
//! from a TOML file; handlers and predicates are attached in code.

use crate::callable::{Handler, Predicate};
use crate::context::Context;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// How operation errors reach the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Errors are returned inside the operation result.
    #[default]
    Silent,
    /// Errors are returned as `Err` once the operation has run to completion.
    Throw,
}

/// Names of the timestamp fields stamped on entities. `None` disables a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Timestamps {
    pub const CREATED_AT: &'static str = "createdAt";
    pub const UPDATED_AT: &'static str = "updatedAt";

    /// Both fields, under their default names.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            created_at: Some(Self::CREATED_AT.to_string()),
            updated_at: Some(Self::UPDATED_AT.to_string()),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Both fields, under custom names.
    #[must_use]
    pub fn named(created_at: &str, updated_at: &str) -> Self {
        Self {
            created_at: Some(created_at.to_string()),
            updated_at: Some(updated_at.to_string()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.created_at.is_some() || self.updated_at.is_some()
    }
}

/// A literal or computed permission (`shouldInit`, `shouldUpdate`).
#[derive(Debug, Clone, Default)]
pub enum Gate {
    #[default]
    Open,
    Closed,
    When(Predicate),
}

impl Gate {
    /// Evaluates the gate. A predicate that fails closes the gate.
    pub(crate) async fn allows(&self, ctx: Context, subject: &str) -> bool {
        match self {
            Self::Open => true,
            Self::Closed => false,
            Self::When(predicate) => match predicate.call(ctx).await {
                Ok(verdict) => verdict.pass,
                Err(e) => {
                    warn!(subject, error = %e, "gate predicate failed, treating as closed");
                    false
                }
            },
        }
    }
}

impl From<bool> for Gate {
    fn from(open: bool) -> Self {
        if open { Self::Open } else { Self::Closed }
    }
}

/// Options applying to a whole schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    pub errors: ErrorMode,
    pub timestamps: Timestamps,
    /// Run after every property's own `onDelete` handlers.
    pub on_delete: Vec<Handler>,
    /// Run after every property's own `onSuccess` handlers.
    pub on_success: Vec<Handler>,
    /// Gates every update before any property is looked at.
    pub should_update: Gate,
}

impl SchemaOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn errors(mut self, mode: ErrorMode) -> Self {
        self.errors = mode;
        self
    }

    #[must_use]
    pub fn timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = timestamps;
        self
    }

    #[must_use]
    pub fn on_delete(mut self, handler: Handler) -> Self {
        self.on_delete.push(handler);
        self
    }

    #[must_use]
    pub fn on_success(mut self, handler: Handler) -> Self {
        self.on_success.push(handler);
        self
    }

    #[must_use]
    pub fn should_update(mut self, gate: impl Into<Gate>) -> Self {
        self.should_update = gate.into();
        self
    }

    #[must_use]
    pub fn should_update_when(self, predicate: Predicate) -> Self {
        self.should_update(Gate::When(predicate))
    }

    /// Parses options from a `schema.toml` document.
    pub fn from_toml_str(contents: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::from_str(contents)?;
        file.into_options()
    }

    /// Loads options from a file. A missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No schema config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&contents).inspect_err(|e| {
            warn!("Failed to parse schema config {:?}: {}", path, e);
        })?;
        info!("Loaded schema config from {:?}", path);
        Ok(options)
    }
}

impl From<Gate> for SchemaOptions {
    fn from(should_update: Gate) -> Self {
        Self::default().should_update(should_update)
    }
}

/// Options for [`crate::Schema::extend`].
#[derive(Debug, Clone, Default)]
pub struct ExtensionOptions {
    /// Replaces the parent's options when present.
    pub options: Option<SchemaOptions>,
    /// Parent properties dropped before the child's definitions are applied.
    pub remove: Vec<String>,
}

impl ExtensionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn remove<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Raw TOML structure matching the schema.toml format.
#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    schema: SchemaSection,
}

#[derive(Deserialize)]
struct SchemaSection {
    #[serde(default)]
    errors: ErrorMode,
    #[serde(default)]
    timestamps: TimestampsSetting,
    #[serde(default = "default_should_update")]
    should_update: bool,
}

impl Default for SchemaSection {
    fn default() -> Self {
        Self {
            errors: ErrorMode::default(),
            timestamps: TimestampsSetting::default(),
            should_update: default_should_update(),
        }
    }
}

fn default_should_update() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampsSetting {
    Toggle(bool),
    Fields {
        #[serde(default)]
        created_at: FieldSetting,
        #[serde(default)]
        updated_at: FieldSetting,
    },
}

impl Default for TimestampsSetting {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldSetting {
    Toggle(bool),
    Name(String),
}

impl Default for FieldSetting {
    fn default() -> Self {
        Self::Toggle(true)
    }
}

impl FieldSetting {
    fn resolve(self, field: &str, default_name: &str) -> Result<Option<String>, SchemaError> {
        match self {
            Self::Toggle(true) => Ok(Some(default_name.to_string())),
            Self::Toggle(false) => Ok(None),
            Self::Name(name) if name.trim().is_empty() => Err(SchemaError::Config(format!(
                "timestamps.{field} must be a non-empty name or a boolean"
            ))),
            Self::Name(name) => Ok(Some(name)),
        }
    }
}

impl SchemaFile {
    fn into_options(self) -> Result<SchemaOptions, SchemaError> {
        let timestamps = match self.schema.timestamps {
            TimestampsSetting::Toggle(true) => Timestamps::enabled(),
            TimestampsSetting::Toggle(false) => Timestamps::disabled(),
            TimestampsSetting::Fields {
                created_at,
                updated_at,
            } => Timestamps {
                created_at: created_at.resolve("created_at", Timestamps::CREATED_AT)?,
                updated_at: updated_at.resolve("updated_at", Timestamps::UPDATED_AT)?,
            },
        };
        Ok(SchemaOptions {
            errors: self.schema.errors,
            timestamps,
            should_update: self.schema.should_update.into(),
            ..SchemaOptions::default()
        })
    }
}
