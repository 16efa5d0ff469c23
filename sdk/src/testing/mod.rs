//! Testing support for entity schemas
//!
//! Provides in-memory collaborators so entity lifecycles can be exercised
//! without an external document store:
//!
//! - [`MemoryDatabase`]: DashMap-backed [`StorageBackend`](crate::StorageBackend) with per-operation counters
//! - [`RecordingCache`]: [`CacheBackend`](crate::CacheBackend) that counts invalidations
//! - [`TestEnvironment`]: an [`Odm`] wired to both
//!
//! # Usage
//!
//! ```rust,ignore
//! use tessera_sdk::testing::{TestEnvironment, doc};
//!
//! #[tokio::test]
//! async fn test_user_roundtrip() {
//!     let env = TestEnvironment::new(vec![user_schema()]).unwrap();
//!     let mut user = env.odm.create("User").unwrap();
//!     user.set(doc(json!({"name": "Ada"}))).await.unwrap();
//!     let id = user.save().await.unwrap();
//!     assert_eq!(env.db.insert_count(), 1);
//! }
//! ```

pub mod memory_cache;
pub mod memory_database;

pub use memory_cache::*;
pub use memory_database::*;

use crate::config::OdmConfig;
use crate::entity::schema::Schema;
use crate::entity::serialization::document_from_json;
use crate::entity::store::Odm;
use crate::entity::types::{Document, EntityResult};
use std::sync::Arc;

/// An `Odm` over in-memory collaborators that tests can inspect
pub struct TestEnvironment {
    pub odm: Arc<Odm>,
    pub db: Arc<MemoryDatabase>,
    pub cache: Arc<RecordingCache>,
}

impl TestEnvironment {
    pub fn new(schemas: Vec<Schema>) -> EntityResult<Self> {
        Self::with_config(schemas, OdmConfig::default())
    }

    pub fn with_config(schemas: Vec<Schema>, config: OdmConfig) -> EntityResult<Self> {
        let db = Arc::new(MemoryDatabase::new());
        let cache = Arc::new(RecordingCache::new());
        let mut builder = Odm::builder()
            .storage(db.clone())
            .cache(cache.clone())
            .config(config);
        for schema in schemas {
            builder = builder.register(schema);
        }
        Ok(Self {
            odm: builder.build()?,
            db,
            cache,
        })
    }
}

/// Build a document from a JSON object literal
pub fn doc(json: serde_json::Value) -> Document {
    document_from_json(json)
}
