//! Schema construction and composition.

use crate::classify::{Category, ClassifiedProperty, classify};
use crate::definition::{Definitions, PropertyDefinition, definitions_from_json};
use crate::engine::Model;
use crate::error::{SchemaError, SchemaResult};
use crate::graph::DependencyGraph;
use crate::options::{ExtensionOptions, SchemaOptions, Timestamps};
use covenant_types::ErrorCollector;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Everything the operation engine needs, produced once per schema.
#[derive(Debug)]
pub(crate) struct ClassifiedSchema {
    /// Non-virtual properties, by name.
    pub(crate) properties: BTreeMap<String, ClassifiedProperty>,
    pub(crate) virtuals: BTreeMap<String, ClassifiedProperty>,
    pub(crate) graph: DependencyGraph,
    pub(crate) options: SchemaOptions,
}

impl ClassifiedSchema {
    fn build(definitions: &Definitions, options: SchemaOptions) -> SchemaResult<Self> {
        let mut errors = ErrorCollector::new();
        if definitions.is_empty() {
            errors.add("schema", "A schema must have at least one property");
            return Err(SchemaError::Invalid {
                payload: errors.into_payload(),
            });
        }

        let mut properties = BTreeMap::new();
        let mut virtuals = BTreeMap::new();
        for (name, definition) in definitions {
            match classify(name, definition) {
                Ok(property) if property.is_virtual() => {
                    virtuals.insert(name.clone(), property);
                }
                Ok(property) => {
                    properties.insert(name.clone(), property);
                }
                Err(reasons) => {
                    errors.add_all(name.as_str(), reasons);
                }
            }
        }

        check_timestamps(definitions, &options.timestamps, &mut errors);
        let graph = DependencyGraph::build(definitions, &properties, &virtuals, &mut errors);

        if errors.is_payload_loaded() {
            debug!(rejected = errors.keys().count(), "schema rejected");
            return Err(SchemaError::Invalid {
                payload: errors.into_payload(),
            });
        }

        debug!(
            properties = properties.len(),
            virtuals = virtuals.len(),
            dependents = graph.order().len(),
            "schema classified"
        );
        Ok(Self {
            properties,
            virtuals,
            graph,
            options,
        })
    }

    /// A property or a virtual.
    pub(crate) fn get(&self, name: &str) -> Option<&ClassifiedProperty> {
        self.properties.get(name).or_else(|| self.virtuals.get(name))
    }
}

fn check_timestamps(
    definitions: &Definitions,
    timestamps: &Timestamps,
    errors: &mut ErrorCollector,
) {
    for name in [&timestamps.created_at, &timestamps.updated_at].into_iter().flatten() {
        if definitions.contains_key(name) {
            errors.add("timestamps", format!("'{name}' is already a property of your schema"));
        }
    }
    if let (Some(created), Some(updated)) = (&timestamps.created_at, &timestamps.updated_at) {
        if created == updated {
            errors.add("timestamps", "createdAt & updatedAt cannot be the same");
        }
    }
}

/// A validated, immutable set of property definitions and schema options.
///
/// Construction classifies every definition and checks the dependency graph;
/// an invalid schema is never returned. Cloning a `Schema` is cheap.
#[derive(Debug, Clone)]
pub struct Schema {
    definitions: Definitions,
    classified: Arc<ClassifiedSchema>,
}

impl Schema {
    /// Classifies `definitions` and checks the dependency graph.
    pub fn new<I, K>(definitions: I, options: SchemaOptions) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = (K, PropertyDefinition)>,
        K: Into<String>,
    {
        let definitions: Definitions = definitions
            .into_iter()
            .map(|(name, def)| (name.into(), def))
            .collect();
        let classified = ClassifiedSchema::build(&definitions, options)?;
        Ok(Self {
            definitions,
            classified: Arc::new(classified),
        })
    }

    /// Builds a schema from a JSON object of literal-only definitions.
    pub fn from_json(definitions: Value, options: SchemaOptions) -> SchemaResult<Self> {
        Self::new(definitions_from_json(definitions)?, options)
    }

    /// Composes a new schema: the parent's definitions minus `remove`, with
    /// `definitions` laid over them, re-validated as a whole.
    pub fn extend<I, K>(&self, definitions: I, extension: ExtensionOptions) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = (K, PropertyDefinition)>,
        K: Into<String>,
    {
        let mut merged = self.definitions.clone();
        for name in &extension.remove {
            if merged.remove(name).is_none() {
                debug!(property = %name, "ignoring removal of unknown property");
            }
        }
        merged.extend(definitions.into_iter().map(|(name, def)| (name.into(), def)));

        let options = extension
            .options
            .unwrap_or_else(|| self.classified.options.clone());
        Self::new(merged, options)
    }

    /// Returns a model bound to this schema.
    #[must_use]
    pub fn model(&self) -> Model {
        Model::new(Arc::clone(&self.classified))
    }

    /// Names of the stored (non-virtual) properties, sorted.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.classified.properties.keys().map(String::as_str)
    }

    /// Names of the virtual properties, sorted.
    pub fn virtuals(&self) -> impl Iterator<Item = &str> {
        self.classified.virtuals.keys().map(String::as_str)
    }

    #[must_use]
    pub fn category(&self, name: &str) -> Option<Category> {
        self.classified.get(name).map(ClassifiedProperty::category)
    }

    /// Dependents re-resolved when `name` changes.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.classified.graph.dependents_of(name)
    }

    #[must_use]
    pub fn options(&self) -> &SchemaOptions {
        &self.classified.options
    }

    /// The definitions this schema was built from.
    #[must_use]
    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }
}
