//! Registry of compiled schemas and their reference indexes

use super::types::Schema;
use crate::entity::types::{EntityError, EntityResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// All registered entity schemas.
///
/// Besides the schemas themselves the registry keeps the reverse reference
/// index: for each entity type, which other types hold references to it and
/// at which paths.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<Schema>>,
    /// target type -> dependent type -> paths in the dependent type
    dependents: HashMap<String, BTreeMap<String, Vec<String>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a schema
    pub fn register(&mut self, mut schema: Schema) -> EntityResult<Arc<Schema>> {
        if self.schemas.contains_key(&schema.name) {
            return Err(EntityError::schema(&schema.name, "schema is already registered"));
        }

        schema.dependencies = schema.collect_dependencies();
        for dependency in &schema.dependencies {
            self.dependents
                .entry(dependency.target.clone())
                .or_default()
                .entry(schema.name.clone())
                .or_default()
                .push(dependency.path.clone());
        }

        debug!(
            "Registered schema '{}' with {} properties and {} reference paths",
            schema.name,
            schema.properties.len(),
            schema.dependencies.len()
        );

        let schema = Arc::new(schema);
        self.schemas.insert(schema.name.clone(), schema.clone());
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(name)
    }

    /// Like `get`, failing with `UnknownModel` when absent
    pub fn require(&self, name: &str) -> EntityResult<&Arc<Schema>> {
        self.get(name).ok_or_else(|| EntityError::UnknownModel {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Entity types that reference `name`, with the referencing paths
    pub fn dependents(&self, name: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.dependents.get(name)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
