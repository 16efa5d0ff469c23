//! Collaborators and context for the entity engine

pub mod backend;
pub mod cache;
pub mod context;

pub use backend::StorageBackend;
pub use cache::{CacheBackend, NoopCache};
pub use context::{Odm, OdmBuilder};
