//! Query-time retrieval policy.
//!
//! The [`Retriever`] owns what happens between a question arriving and
//! context passages being handed to the prompt assembler: embed the question
//! (under a deadline), run the index's similarity + diversity search, and
//! optionally drop candidates under a relevance floor. It never mutates the
//! index.

pub mod mmr;

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::index::{EmbeddingIndex, SearchParams};
use crate::providers::{EmbedError, EmbeddingProvider};
use crate::stores::StoreError;

/// Errors raised while retrieving context for a question.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RetrievalError {
    /// The question embedding failed.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// The question embedding did not finish within its deadline.
    #[error("query embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// The index search did not finish within its deadline.
    #[error("index search timed out after {0:?}")]
    SearchTimeout(Duration),

    /// The index backend failed.
    #[error("index search failed: {0}")]
    Store(#[from] StoreError),
}

/// One retrieved passage, ranked and attributed to its source document.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Stable chunk identifier.
    pub id: String,
    /// Origin identifier of the source document.
    pub origin: String,
    /// Chunk position within its document.
    pub chunk_index: usize,
    /// The passage text.
    pub text: String,
    /// Relevance score from the selection stage (cosine similarity).
    pub score: f32,
}

/// Embeds questions and queries an [`EmbeddingIndex`] with fixed policy.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    params: SearchParams,
    relevance_floor: Option<f32>,
    embed_timeout: Duration,
}

impl Retriever {
    /// Build a retriever from the retrieval configuration.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RetrievalConfig,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            params: SearchParams {
                k: config.top_k,
                fetch_k: config.fetch_k,
                diversity_weight: config.diversity_weight,
            },
            relevance_floor: config.relevance_floor,
            embed_timeout,
        }
    }

    /// Retrieve ranked context for `question` from `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::EmbeddingTimeout`] when the embedding call
    /// exceeds its deadline, [`RetrievalError::Embedding`] on provider
    /// failure, and [`RetrievalError::Store`] on backend failure. An empty
    /// index is not an error; it retrieves nothing.
    pub async fn retrieve(
        &self,
        index: &EmbeddingIndex,
        question: &str,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let query = tokio::time::timeout(self.embed_timeout, self.embedder.embed(question))
            .await
            .map_err(|_| RetrievalError::EmbeddingTimeout(self.embed_timeout))??;

        let hits = tokio::time::timeout(self.embed_timeout, index.search(&query, &self.params))
            .await
            .map_err(|_| RetrievalError::SearchTimeout(self.embed_timeout))??;
        let floor = self.relevance_floor.unwrap_or(f32::NEG_INFINITY);
        let retrieved: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.similarity >= floor)
            .map(|hit| RetrievedChunk {
                id: hit.record.id,
                origin: hit.record.origin,
                chunk_index: hit.record.chunk_index,
                text: hit.record.content,
                score: hit.similarity,
            })
            .collect();

        tracing::debug!(
            question_chars = question.len(),
            retrieved = retrieved.len(),
            "retrieved context"
        );
        Ok(retrieved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::providers::mock::MockEmbeddingProvider;
    use crate::stores::InMemoryVectorStore;

    fn chunk(id: &str, origin: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_owned(),
            origin: origin.to_owned(),
            unit_index: 0,
            chunk_index: 0,
            text: text.to_owned(),
        }
    }

    async fn seeded_index(embedder: &MockEmbeddingProvider) -> EmbeddingIndex {
        let index = EmbeddingIndex::new(Arc::new(InMemoryVectorStore::new()));
        let chunks = [
            chunk("exams", "handbook.txt", "Admission exams are held in July."),
            chunk(
                "grants",
                "grants.txt",
                "Scholarship applications open in March for enrolled students.",
            ),
        ];
        let mut embeddings = Vec::new();
        for c in &chunks {
            embeddings.push(embedder.embed(&c.text).await.unwrap());
        }
        index.upsert(&chunks, embeddings).await.unwrap();
        index
    }

    #[tokio::test]
    async fn retrieves_topically_closest_chunk_first() {
        let embedder = MockEmbeddingProvider::new();
        let index = seeded_index(&embedder).await;
        let retriever = Retriever::new(
            Arc::new(embedder),
            &RetrievalConfig::default(),
            Duration::from_secs(5),
        );
        let hits = retriever
            .retrieve(&index, "when are admission exams?")
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].origin, "handbook.txt");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn empty_index_retrieves_nothing() {
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let index = EmbeddingIndex::new(Arc::new(InMemoryVectorStore::new()));
        let retriever = Retriever::new(
            embedder,
            &RetrievalConfig::default(),
            Duration::from_secs(5),
        );
        let hits = retriever.retrieve(&index, "anything at all").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn relevance_floor_drops_weak_candidates() {
        let embedder = MockEmbeddingProvider::new();
        let index = seeded_index(&embedder).await;
        let config = RetrievalConfig {
            relevance_floor: Some(0.99),
            ..RetrievalConfig::default()
        };
        let retriever = Retriever::new(Arc::new(embedder), &config, Duration::from_secs(5));
        let hits = retriever
            .retrieve(&index, "entirely unrelated topic nothing shared")
            .await
            .unwrap();
        assert!(hits.is_empty(), "floor should drop weak matches: {hits:?}");
    }
}
