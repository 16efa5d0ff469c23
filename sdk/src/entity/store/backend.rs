//! Storage backend abstraction for entity documents

use crate::entity::types::{Document, Value};
use anyhow::Result;
use async_trait::async_trait;

/// Trait for storage backends.
///
/// Every operation addresses a single document by identifier within a
/// collection and is expected to be atomic for that document.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert a new document and return its identifier.
    ///
    /// Implementations generate an identifier when the document carries none.
    async fn insert(&self, collection: &str, document: Document) -> Result<Value>;

    /// Replace the document with this identifier, creating it if absent
    async fn replace_upsert(&self, collection: &str, id: &Value, document: Document) -> Result<()>;

    /// Apply a dot-notation partial update, creating the document if absent
    async fn partial_upsert(&self, collection: &str, id: &Value, update: Document) -> Result<()>;

    /// Delete the document with this identifier
    async fn delete_one(&self, collection: &str, id: &Value) -> Result<()>;

    /// Find a document by identifier
    async fn find_one(&self, collection: &str, id: &Value) -> Result<Option<Document>>;
}
