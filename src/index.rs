//! The embedding index: vector storage plus diversity-aware search.
//!
//! Wraps a [`VectorStore`] and implements the two-stage search policy: fetch
//! the `fetch_k` nearest candidates by cosine similarity, then select `k` of
//! them with maximal marginal relevance so one verbose passage cannot crowd
//! out the rest of the corpus.

use std::sync::Arc;

use crate::chunker::Chunk;
use crate::retrieval::mmr;
use crate::stores::{ScoredRecord, StoreError, VectorRecord, VectorStore};

/// Parameters of one search call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Results returned to the caller.
    pub k: usize,
    /// Similarity candidates pooled before diversity selection.
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity.
    pub diversity_weight: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            k: 6,
            fetch_k: 20,
            diversity_weight: 0.7,
        }
    }
}

/// A vector index over one collection of chunk embeddings.
///
/// The index exclusively owns its store's records: rebuilds clear the
/// collection before inserting, so contents always reflect exactly the
/// current document set.
#[derive(Clone)]
pub struct EmbeddingIndex {
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex").finish_non_exhaustive()
    }
}

impl EmbeddingIndex {
    /// Wrap a backing store.
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Insert chunk/embedding pairs, replacing records with matching ids.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backend; mismatched input lengths
    /// are a backend error as well.
    pub async fn upsert(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Backend(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord::from_chunk(chunk, embedding))
            .collect();
        self.store.upsert(records).await
    }

    /// Remove every record in the collection.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backend.
    pub async fn delete_all(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }

    /// Replace the collection contents with the given chunk set.
    ///
    /// The prior contents are deleted first so the index never holds a stale
    /// superset of the current documents.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backend.
    pub async fn rebuild(
        &self,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), StoreError> {
        self.store.clear().await?;
        self.upsert(chunks, embeddings).await
    }

    /// Two-stage similarity + diversity search.
    ///
    /// An empty index yields an empty result, never an error.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backend (including query dimension
    /// mismatches).
    pub async fn search(
        &self,
        query: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let pool = params.fetch_k.max(params.k);
        let candidates = self.store.nearest(query, pool).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        Ok(mmr::select(candidates, params.k, params.diversity_weight))
    }

    /// Number of indexed chunks.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the backend.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }
}
