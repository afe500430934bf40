//! Storage backends for chunk vectors.
//!
//! A [`VectorStore`] persists one vector record per chunk and answers
//! nearest-neighbour queries by cosine similarity. The embedding index layers
//! diversity-aware selection on top; backends only rank by similarity.
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ VectorStore trait│
//!                  │   (async CRUD)   │
//!                  └────────┬─────────┘
//!                           │
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!      ┌───────────────┐        ┌───────────────┐
//!      │   in-memory   │        │    SQLite     │
//!      │ RwLock<Vec<_>>│        │  sqlite-vec   │
//!      └───────────────┘        └───────────────┘
//! ```
//!
//! Rebuild semantics: [`VectorStore::clear`] removes every record of the
//! store's collection so a re-ingestion starts from nothing; the index never
//! silently merges fresh vectors with stale ones.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;

pub use memory::InMemoryVectorStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A vector's dimension disagrees with the store's contents.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A chunk paired with its embedding, as persisted in a store.
///
/// The store owns these records exclusively; chunks themselves are referenced
/// by value and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Stable chunk identifier.
    pub id: String,
    /// Origin identifier of the source document.
    pub origin: String,
    /// Text unit the chunk was cut from.
    pub unit_index: usize,
    /// Chunk position within its document.
    pub chunk_index: usize,
    /// The chunk text.
    pub content: String,
    /// Arbitrary metadata carried alongside the chunk.
    pub metadata: serde_json::Value,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Pair a chunk with its embedding.
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            origin: chunk.origin.clone(),
            unit_index: chunk.unit_index,
            chunk_index: chunk.chunk_index,
            content: chunk.text.clone(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding,
        }
    }
}

/// A record scored against a query vector (cosine similarity, higher wins).
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub similarity: f32,
}

/// Async interface every vector backend implements.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any with the same id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), StoreError>;

    /// Remove every record in the collection.
    async fn clear(&self) -> Result<(), StoreError>;

    /// The `limit` most similar records to `query`, best first. An empty
    /// store returns an empty result, never an error.
    async fn nearest(&self, query: &[f32], limit: usize)
    -> Result<Vec<ScoredRecord>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}
