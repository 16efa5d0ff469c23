// Cache collaborator that records invalidations for testing
use crate::entity::store::cache::CacheBackend;
use crate::entity::types::Value;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct RecordingCache {
    // "type:id" -> number of invalidations
    entries: DashMap<String, usize>,
    // type -> number of type-wide invalidations
    types: DashMap<String, usize>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often the entry for one entity was invalidated
    pub fn invalidations(&self, entity_type: &str, id: &Value) -> usize {
        self.entries
            .get(&Self::key(entity_type, id))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// How often all entries of a type were invalidated
    pub fn type_invalidations(&self, entity_type: &str) -> usize {
        self.types.get(entity_type).map(|count| *count).unwrap_or(0)
    }

    /// Total single-entity invalidations
    pub fn total_invalidations(&self) -> usize {
        self.entries.iter().map(|entry| *entry.value()).sum()
    }

    fn key(entity_type: &str, id: &Value) -> String {
        format!("{}:{}", entity_type, id)
    }
}

#[async_trait]
impl CacheBackend for RecordingCache {
    async fn invalidate(&self, entity_type: &str, id: &Value) -> Result<()> {
        *self.entries.entry(Self::key(entity_type, id)).or_default() += 1;
        Ok(())
    }

    async fn invalidate_type(&self, entity_type: &str) -> Result<()> {
        *self.types.entry(entity_type.to_string()).or_default() += 1;
        Ok(())
    }
}
