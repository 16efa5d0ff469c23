// In-memory document storage for testing
use crate::entity::serialization::apply_dotted;
use crate::entity::store::backend::StorageBackend;
use crate::entity::types::{Document, ID_KEY, ObjectId, Value};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Counters {
    insert: AtomicUsize,
    replace: AtomicUsize,
    partial: AtomicUsize,
    delete: AtomicUsize,
    find: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    // collection -> id key -> document
    data: DashMap<String, DashMap<String, Document>>,
    // collection -> partial update documents in the order they were applied
    partial_updates: DashMap<String, Vec<Document>>,
    counters: Counters,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.data.clear();
        self.partial_updates.clear();
    }

    /// Number of documents in a collection
    pub fn collection_count(&self, collection: &str) -> usize {
        self.data
            .get(collection)
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    /// Get a stored document by id (for testing purposes)
    pub fn document(&self, collection: &str, id: &Value) -> Option<Document> {
        self.data
            .get(collection)
            .and_then(|documents| documents.get(&id.to_string()).map(|entry| entry.value().clone()))
    }

    /// Get all documents in a collection (for testing purposes)
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.data
            .get(collection)
            .map(|documents| documents.iter().map(|entry| entry.value().clone()).collect())
            .unwrap_or_default()
    }

    /// Store a document directly, bypassing the counters
    pub fn seed(&self, collection: &str, document: Document) -> Value {
        let (key, id) = Self::identify(&document);
        let mut document = document;
        document.insert(ID_KEY.to_string(), id.clone());
        self.collection(collection).insert(key, document);
        id
    }

    /// Partial updates applied to a collection, oldest first
    pub fn partial_updates(&self, collection: &str) -> Vec<Document> {
        self.partial_updates
            .get(collection)
            .map(|updates| updates.value().clone())
            .unwrap_or_default()
    }

    pub fn insert_count(&self) -> usize {
        self.counters.insert.load(Ordering::SeqCst)
    }

    pub fn replace_count(&self) -> usize {
        self.counters.replace.load(Ordering::SeqCst)
    }

    pub fn partial_count(&self) -> usize {
        self.counters.partial.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn find_count(&self) -> usize {
        self.counters.find.load(Ordering::SeqCst)
    }

    /// Total number of storage calls of any kind
    pub fn operation_count(&self) -> usize {
        self.insert_count()
            + self.replace_count()
            + self.partial_count()
            + self.delete_count()
            + self.find_count()
    }

    fn collection(&self, name: &str) -> RefMut<'_, String, DashMap<String, Document>> {
        self.data.entry(name.to_string()).or_default()
    }

    fn identify(document: &Document) -> (String, Value) {
        match document.get(ID_KEY) {
            Some(id) if !id.is_null() => (id.to_string(), id.clone()),
            _ => {
                let id = ObjectId::new();
                (id.to_string(), Value::ObjectId(id))
            }
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryDatabase {
    async fn insert(&self, collection: &str, document: Document) -> Result<Value> {
        self.counters.insert.fetch_add(1, Ordering::SeqCst);
        let (key, id) = Self::identify(&document);
        let documents = self.collection(collection);
        if documents.contains_key(&key) {
            anyhow::bail!("duplicate key '{}' in collection '{}'", key, collection);
        }
        let mut document = document;
        document.insert(ID_KEY.to_string(), id.clone());
        documents.insert(key, document);
        Ok(id)
    }

    async fn replace_upsert(&self, collection: &str, id: &Value, document: Document) -> Result<()> {
        self.counters.replace.fetch_add(1, Ordering::SeqCst);
        let mut document = document;
        document.insert(ID_KEY.to_string(), id.clone());
        self.collection(collection).insert(id.to_string(), document);
        Ok(())
    }

    async fn partial_upsert(&self, collection: &str, id: &Value, update: Document) -> Result<()> {
        self.counters.partial.fetch_add(1, Ordering::SeqCst);
        self.partial_updates
            .entry(collection.to_string())
            .or_default()
            .push(update.clone());

        let documents = self.collection(collection);
        let mut entry = documents.entry(id.to_string()).or_insert_with(|| {
            let mut document = Document::new();
            document.insert(ID_KEY.to_string(), id.clone());
            document
        });
        apply_dotted(entry.value_mut(), update);
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &Value) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        if let Some(documents) = self.data.get(collection) {
            documents.remove(&id.to_string());
        }
        Ok(())
    }

    async fn find_one(&self, collection: &str, id: &Value) -> Result<Option<Document>> {
        self.counters.find.fetch_add(1, Ordering::SeqCst);
        Ok(self.document(collection, id))
    }
}
