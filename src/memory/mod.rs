//! The memory service the adapter talks to.
//!
//! [`MemoryBackend`] is the narrow operation set the commands depend on.
//! [`LocalMemoryService`] implements it over SQLite (FTS5 + sqlite-vec) with
//! hosted embedding and LLM providers.

pub mod categories;
pub mod forget;
pub mod resources;
pub mod search;
pub mod service;
pub mod store;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use service::LocalMemoryService;
use types::{MemorizeResult, MemoryCategory, MemoryItem, MemoryType, Modality, RetrieveResult};

#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Store one item directly, linking it to the named categories.
    async fn create_memory_item(
        &self,
        memory_type: MemoryType,
        content: &str,
        categories: &[String],
        user_id: Option<&str>,
    ) -> Result<MemoryItem>;

    /// Ranked retrieval for a natural-language query.
    async fn retrieve(&self, query: &str) -> Result<RetrieveResult>;

    /// Delete an item. Errors if it does not exist.
    async fn delete_memory_item(&self, id: &str) -> Result<()>;

    async fn list_memory_items(&self) -> Result<Vec<MemoryItem>>;

    async fn list_memory_categories(&self) -> Result<Vec<MemoryCategory>>;

    /// Ingest a resource and extract memory items from it.
    async fn memorize(
        &self,
        resource_url: &str,
        modality: Modality,
        user_id: Option<&str>,
    ) -> Result<MemorizeResult>;
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    // SAFETY: f32 has no invalid bit patterns and u8 has alignment 1.
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
