//! Shared engine context: schemas, collaborators and configuration

use super::backend::StorageBackend;
use super::cache::{CacheBackend, NoopCache};
use crate::config::OdmConfig;
use crate::entity::model::Model;
use crate::entity::schema::{Schema, SchemaRegistry, SchemaValidator};
use crate::entity::types::{Document, EntityError, EntityResult, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point of the engine.
///
/// Built once and shared by `Arc` with every entity instance it creates.
pub struct Odm {
    registry: SchemaRegistry,
    storage: Arc<dyn StorageBackend>,
    cache: Arc<dyn CacheBackend>,
    config: OdmConfig,
}

impl std::fmt::Debug for Odm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Odm")
            .field("schemas", &self.registry.names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl Odm {
    pub fn builder() -> OdmBuilder {
        OdmBuilder::default()
    }

    /// Create an empty instance of a registered entity type
    pub fn create(self: &Arc<Self>, name: &str) -> EntityResult<Model> {
        self.create_with(name, Document::new())
    }

    /// Create an instance over raw data, as read from storage. No validation is applied.
    pub fn create_with(self: &Arc<Self>, name: &str, data: Document) -> EntityResult<Model> {
        let schema = self.registry.require(name)?.clone();
        Ok(Model::new(self.clone(), schema, data))
    }

    /// Load an entity by identifier
    pub async fn load(self: &Arc<Self>, name: &str, id: &Value) -> EntityResult<Model> {
        let schema = self.registry.require(name)?.clone();
        let collection = self.collection_name(name);

        debug!("Loading '{}' with id '{}'", name, id);
        let document = self
            .storage
            .find_one(&collection, id)
            .await
            .map_err(|e| EntityError::storage(name, "find_one", e))?
            .ok_or_else(|| EntityError::NotFound {
                entity_type: name.to_string(),
                id: id.to_string(),
            })?;

        Ok(Model::new(self.clone(), schema, document))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn schema(&self, name: &str) -> EntityResult<&Arc<Schema>> {
        self.registry.require(name)
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    /// Storage collection holding an entity type
    pub fn collection_name(&self, name: &str) -> String {
        format!("{}{}", self.config.collection_prefix, name)
    }
}

/// Builder for [`Odm`]
#[derive(Default)]
pub struct OdmBuilder {
    schemas: Vec<Schema>,
    storage: Option<Arc<dyn StorageBackend>>,
    cache: Option<Arc<dyn CacheBackend>>,
    config: OdmConfig,
}

impl OdmBuilder {
    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: OdmConfig) -> Self {
        self.config = config;
        self
    }

    /// Register all schemas, validate them and freeze the context
    pub fn build(self) -> EntityResult<Arc<Odm>> {
        let storage = self
            .storage
            .ok_or_else(|| EntityError::configuration("a storage backend is required"))?;

        let mut registry = SchemaRegistry::new();
        for schema in self.schemas {
            registry.register(schema)?;
        }

        let result = SchemaValidator::new()
            .validate(&registry)
            .map_err(|e| EntityError::schema("<registry>", e.to_string()))?;
        for warning in &result.warnings {
            warn!("{}", warning);
        }
        if !result.is_valid() {
            return Err(EntityError::schema("<registry>", result.errors.join("; ")));
        }

        debug!("Built entity context with {} schemas", registry.len());
        Ok(Arc::new(Odm {
            registry,
            storage,
            cache: self.cache.unwrap_or_else(|| Arc::new(NoopCache)),
            config: self.config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::schema::PropertyDescriptor;
    use crate::testing::MemoryDatabase;

    #[test]
    fn build_requires_storage() {
        let err = Odm::builder().build().unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn build_rejects_unknown_reference() {
        let err = Odm::builder()
            .storage(Arc::new(MemoryDatabase::new()))
            .register(Schema::new("Post").with_property("author", PropertyDescriptor::of("Usr")))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "schema");
        assert!(err.to_string().contains("Usr"));
    }

    #[test]
    fn collection_names_use_prefix() {
        let odm = Odm::builder()
            .storage(Arc::new(MemoryDatabase::new()))
            .config(OdmConfig {
                collection_prefix: "app_".to_string(),
                ..OdmConfig::default()
            })
            .register(Schema::new("User"))
            .build()
            .unwrap();
        assert_eq!(odm.collection_name("User"), "app_User");
        assert!(odm.create("User").is_ok());
        assert_eq!(odm.create("Nope").unwrap_err().kind(), "unknown_model");
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let odm = Odm::builder()
            .storage(Arc::new(MemoryDatabase::new()))
            .register(Schema::new("User"))
            .build()
            .unwrap();
        let err = odm
            .load("User", &Value::from(crate::entity::types::ObjectId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
