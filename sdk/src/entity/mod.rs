//! Schema-typed entity engine
//!
//! Entity types are described by schemas whose properties are base types,
//! nested objects, arrays or references to other entity types. Instances
//! validate assigned values, track partial changes, persist through a
//! [`StorageBackend`] and convert between live nested entities and the
//! denormalized reference stubs stored in documents.

pub mod handler;
pub mod hydration;
pub mod model;
pub mod schema;
pub mod serialization;
pub mod store;
pub mod types;

// Re-export commonly used types and traits
pub use model::Model;
pub use serialization::{document_from_json, document_to_json, to_json};
pub use store::{CacheBackend, NoopCache, Odm, OdmBuilder, StorageBackend};
pub use types::{Document, EntityError, EntityResult, ID_KEY, ObjectId, Timestamp, Value};

// Re-export schema types
pub use schema::{
    Dependency, Primitive, Property, PropertyDescriptor, PropertyType, Schema, SchemaRegistry,
    SchemaValidator,
};
