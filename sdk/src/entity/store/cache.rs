//! Cache invalidation hooks

use crate::entity::types::Value;
use anyhow::Result;
use async_trait::async_trait;

/// Process-wide cache the engine keeps consistent on mutation.
///
/// The engine never reads through the cache; it only emits invalidations.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Drop the entry cached for one entity
    async fn invalidate(&self, entity_type: &str, id: &Value) -> Result<()>;

    /// Drop every entry cached for an entity type
    async fn invalidate_type(&self, entity_type: &str) -> Result<()>;
}

/// Cache that holds nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheBackend for NoopCache {
    async fn invalidate(&self, _entity_type: &str, _id: &Value) -> Result<()> {
        Ok(())
    }

    async fn invalidate_type(&self, _entity_type: &str) -> Result<()> {
        Ok(())
    }
}
