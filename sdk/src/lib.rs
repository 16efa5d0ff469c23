pub mod config;
pub mod entity;
pub mod logging;
pub mod testing;

// Re-export commonly used types for convenience
pub use config::OdmConfig;
pub use logging::init_logging;

// Re-export async_trait macro for convenience
pub use async_trait::async_trait;

// Re-export testing framework components
pub use testing::{MemoryDatabase, RecordingCache, TestEnvironment};

// Re-export entity framework components
pub use entity::{
    CacheBackend, Document, EntityError, EntityResult, ID_KEY, Model, NoopCache, ObjectId, Odm,
    OdmBuilder, PropertyDescriptor, PropertyType, Schema, StorageBackend, Timestamp, Value,
};
