//! Entity instances and their lifecycle

use crate::entity::handler;
use crate::entity::schema::{Primitive, PropertyType, Schema};
use crate::entity::serialization::{deep_merge, dotted_update, has_ancestor_in, lookup_dotted};
use crate::entity::store::Odm;
use crate::entity::types::{Document, EntityError, EntityResult, ID_KEY, Value};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Set,
    Merge,
}

/// A live, schema-typed entity.
///
/// Holds the raw data, the dot paths changed by `merge` since the last save,
/// whether the next save must replace the stored document, and which
/// reference paths are currently hydrated.
///
/// An instance is not meant for concurrent mutation; callers serialize
/// `set`, `merge`, `save` and `delete` on it.
#[derive(Clone)]
pub struct Model {
    odm: Arc<Odm>,
    schema: Arc<Schema>,
    pub(crate) data: Document,
    pending: BTreeSet<String>,
    overwrite: bool,
    pub(crate) hydrated: BTreeSet<String>,
}

impl Model {
    pub(crate) fn new(odm: Arc<Odm>, schema: Arc<Schema>, data: Document) -> Self {
        Self {
            odm,
            schema,
            data,
            pending: BTreeSet::new(),
            overwrite: false,
            hydrated: BTreeSet::new(),
        }
    }

    /// Entity type name
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn odm(&self) -> &Arc<Odm> {
        &self.odm
    }

    /// Raw data, including live sub-entities and reference stubs
    pub fn data(&self) -> &Document {
        &self.data
    }

    /// Identifier, if one has been assigned or persisted
    pub fn identifier(&self) -> Option<&Value> {
        self.data.get(ID_KEY).filter(|id| !id.is_null())
    }

    /// Dot paths changed by `merge` since the last save
    pub fn pending_paths(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the next save replaces the stored document
    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn hydrated_paths(&self) -> &BTreeSet<String> {
        &self.hydrated
    }

    /// The dot-notation update a partial save would issue right now
    pub fn pending_update(&self) -> Document {
        dotted_update(&self.data, &self.pending)
    }

    /// Replace all properties. The identifier is kept; the next save replaces the stored document.
    pub async fn set(&mut self, properties: Document) -> EntityResult<&mut Self> {
        self.apply(properties, Mode::Set).await?;
        Ok(self)
    }

    /// Update the given properties and record them for a partial save
    pub async fn merge(&mut self, properties: Document) -> EntityResult<&mut Self> {
        self.apply(properties, Mode::Merge).await?;
        Ok(self)
    }

    fn apply(&mut self, mut properties: Document, mode: Mode) -> BoxFuture<'_, EntityResult<()>> {
        async move {
            let schema = self.schema.clone();
            let odm = self.odm.clone();

            if properties.contains_key(ID_KEY) && self.identifier().is_some() {
                return Err(EntityError::CantOverwriteId {
                    entity_type: schema.name.clone(),
                });
            }

            if mode == Mode::Set {
                let id = self.data.remove(ID_KEY);
                self.data.clear();
                if let Some(id) = id.filter(|id| !id.is_null()) {
                    self.data.insert(ID_KEY.to_string(), id);
                }
                self.pending.clear();
                self.overwrite = true;
            }

            self.hydrate_at(None, 0).await?;

            if !schema.has_property(ID_KEY) {
                if let Some(id) = properties.remove(ID_KEY) {
                    if let Some(id) = coerce_identifier(&schema.name, id)? {
                        self.data.insert(ID_KEY.to_string(), id);
                    }
                }
            }

            let mut assignments = Vec::with_capacity(properties.len());
            for (key, input) in properties {
                let descriptor = schema
                    .property(&key)
                    .ok_or_else(|| EntityError::PropertyNotAllowed {
                        entity_type: schema.name.clone(),
                        property: key.clone(),
                    })?;
                let odm = &odm;
                assignments.push(async move {
                    let resolved = handler::resolve(odm, descriptor, input, key.clone(), 0).await?;
                    Ok::<_, EntityError>((key, descriptor, resolved))
                });
            }

            for (key, descriptor, resolved) in try_join_all(assignments).await? {
                match mode {
                    Mode::Set => {
                        self.data.insert(key, resolved.value);
                    }
                    Mode::Merge => {
                        let mergeable = matches!(
                            descriptor.kind,
                            PropertyType::Object(_) | PropertyType::Primitive(Primitive::Mixed)
                        );
                        match self.data.get_mut(&key) {
                            Some(existing) if mergeable => deep_merge(existing, resolved.value),
                            _ => {
                                self.data.insert(key, resolved.value);
                            }
                        }
                        self.pending.extend(resolved.dirty);
                    }
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// Computed view: defaults applied, required properties checked, absent values omitted
    pub fn get(&self) -> EntityResult<Document> {
        let registry = self.odm.registry();
        let mut view = Document::new();

        if !self.schema.has_property(ID_KEY) {
            if let Some(id) = self.identifier() {
                view.insert(ID_KEY.to_string(), handler::primitive::get(Primitive::ObjectId, id));
            }
        }

        for property in &self.schema.properties {
            let raw = self.data.get(&property.name);
            if let Some(value) = handler::read(registry, &property.descriptor, raw, &property.name)? {
                view.insert(property.name.clone(), value);
            }
        }

        Ok(view)
    }

    /// Persist the entity and return its identifier.
    ///
    /// Live sub-entities are saved first, then replaced by stubs. The entity
    /// is then inserted, replaced or partially updated depending on whether
    /// it has an identifier and whether `set` was called since the last save.
    pub fn save(&mut self) -> BoxFuture<'_, EntityResult<Value>> {
        async move {
            self.save_embedded().await?;
            self.dehydrate()?;

            let id = self.identifier().cloned();
            match id {
                Some(_) if !self.overwrite => self.save_partial().await,
                id => self.save_full(id).await,
            }
        }
        .boxed()
    }

    async fn save_full(&mut self, id: Option<Value>) -> EntityResult<Value> {
        let document = self.get()?;
        let name = self.schema.name.clone();
        let collection = self.odm.collection_name(&name);
        let storage = self.odm.storage().clone();

        let id = match id {
            Some(id) => {
                debug!("Replacing '{}' with id '{}'", name, id);
                storage
                    .replace_upsert(&collection, &id, document)
                    .await
                    .map_err(|e| EntityError::storage(&name, "replace_upsert", e))?;
                id
            }
            None => {
                let id = storage
                    .insert(&collection, document)
                    .await
                    .map_err(|e| EntityError::storage(&name, "insert", e))?;
                debug!("Inserted '{}' with id '{}'", name, id);
                id
            }
        };

        self.data.insert(ID_KEY.to_string(), id.clone());
        self.pending.clear();
        self.overwrite = false;
        Ok(id)
    }

    async fn save_partial(&mut self) -> EntityResult<Value> {
        let name = self.schema.name.clone();
        let id = self
            .identifier()
            .cloned()
            .ok_or_else(|| EntityError::MissingIdOnMergeSave {
                entity_type: name.clone(),
            })?;

        if self.pending.is_empty() {
            debug!("No pending changes on '{}' with id '{}'", name, id);
            return Ok(id);
        }

        if let Some(path) = self
            .pending
            .iter()
            .find(|path| !has_ancestor_in(path, &self.pending) && lookup_dotted(&self.data, path).is_none())
        {
            return Err(EntityError::validation(
                path,
                "dotPath",
                format!("pending change on '{}' does not resolve to a value", name),
            ));
        }

        let update = self.pending_update();
        debug!(
            "Partially updating '{}' with id '{}' at {:?}",
            name,
            id,
            update.keys().collect::<Vec<_>>()
        );
        let collection = self.odm.collection_name(&name);
        self.odm
            .storage()
            .partial_upsert(&collection, &id, update)
            .await
            .map_err(|e| EntityError::storage(&name, "partial_upsert", e))?;
        self.pending.clear();

        let cache = self.odm.cache().clone();
        cache
            .invalidate(&name, &id)
            .await
            .map_err(|e| EntityError::cache(&name, e))?;

        if let Some(dependents) = self.odm.registry().dependents(&name) {
            for (dependent, paths) in dependents {
                debug!(
                    "Invalidating '{}' entries embedding '{}' at {:?}",
                    dependent, name, paths
                );
                cache
                    .invalidate_type(dependent)
                    .await
                    .map_err(|e| EntityError::cache(dependent, e))?;
            }
        }

        Ok(id)
    }

    /// Delete the stored entity. Without an identifier nothing is touched.
    ///
    /// On success every field of the instance is cleared. On failure the
    /// instance is left as it was, so the delete can be retried.
    pub async fn delete(&mut self) -> EntityResult<()> {
        let name = self.schema.name.clone();
        let Some(id) = self.identifier().cloned() else {
            debug!("Nothing to delete for unsaved '{}'", name);
            return Ok(());
        };

        self.odm
            .cache()
            .invalidate(&name, &id)
            .await
            .map_err(|e| EntityError::cache(&name, e))?;
        self.odm
            .storage()
            .delete_one(&self.odm.collection_name(&name), &id)
            .await
            .map_err(|e| EntityError::storage(&name, "delete_one", e))?;

        self.data.clear();
        self.pending.clear();
        self.hydrated.clear();
        self.overwrite = false;

        debug!("Deleted '{}' with id '{}'", name, id);
        Ok(())
    }

    /// Stub for this entity at a reference path: `_id` plus the embedded fields
    pub(crate) fn stub(&self, embed: &[String]) -> EntityResult<Document> {
        let view = self.get()?;
        let mut stub = Document::new();
        for field in embed {
            if let Some(value) = view.get(field) {
                stub.insert(field.clone(), detach(value.clone()));
            }
        }
        if let Some(id) = view.get(ID_KEY).or_else(|| self.identifier()) {
            stub.insert(ID_KEY.to_string(), id.clone());
        }
        Ok(stub)
    }

    /// Embed-then-persist step of `save` for every live sub-entity
    async fn save_embedded(&mut self) -> EntityResult<()> {
        let schema = self.schema.clone();
        let children = crate::entity::hydration::slots(&mut self.data, schema.dependencies.iter())
            .into_iter()
            .filter_map(|slot| match slot.value {
                Value::Model(child) => Some(child.save()),
                _ => None,
            });
        try_join_all(children).await?;
        Ok(())
    }
}

/// Accept an identifier assigned through `set` or `merge`.
///
/// A malformed string encoding is a validation failure; any other kind of
/// value is not an identifier at all.
fn coerce_identifier(entity_type: &str, id: Value) -> EntityResult<Option<Value>> {
    match id {
        Value::Null => Ok(None),
        Value::ObjectId(_) => Ok(Some(id)),
        Value::String(s) => {
            handler::primitive::parse_object_id(&s, ID_KEY).map(|oid| Some(Value::ObjectId(oid)))
        }
        other => Err(EntityError::InvalidId {
            entity_type: entity_type.to_string(),
            reason: format!("expected an object id, got {}", other.type_name()),
        }),
    }
}

/// Replace live entities nested in an embedded value by id-only stubs
fn detach(value: Value) -> Value {
    match value {
        Value::Model(model) => {
            let mut stub = Document::new();
            if let Some(id) = model.identifier() {
                stub.insert(ID_KEY.to_string(), id.clone());
            }
            Value::Object(stub)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(detach).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, detach(v))).collect()),
        other => other,
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.schema.name)
            .field("data", &self.data)
            .field("pending", &self.pending)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.data == other.data
    }
}
