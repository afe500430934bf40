//! In-memory vector store backed by a read/write lock.
//!
//! Suitable for tests, demos, and corpora that fit comfortably in memory.
//! Nearest-neighbour queries are a full scan ranked by cosine similarity,
//! which is plenty for the corpus sizes this pipeline targets.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ScoredRecord, StoreError, VectorRecord, VectorStore};
use crate::retrieval::mmr::cosine_similarity;

/// Thread-safe in-memory backend.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut guard = self.records.write();
        let expected = guard
            .first()
            .map(|r| r.embedding.len())
            .or_else(|| records.first().map(|r| r.embedding.len()))
            .unwrap_or(0);
        for record in &records {
            if record.embedding.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
        }
        guard.retain(|existing| !records.iter().any(|r| r.id == existing.id));
        guard.extend(records);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.write().clear();
        Ok(())
    }

    async fn nearest(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let guard = self.records.read();
        if guard.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        if let Some(first) = guard.first()
            && first.embedding.len() != query.len()
        {
            return Err(StoreError::DimensionMismatch {
                expected: first.embedding.len(),
                actual: query.len(),
            });
        }
        let mut scored: Vec<ScoredRecord> = guard
            .iter()
            .map(|record| ScoredRecord {
                similarity: cosine_similarity(query, &record.embedding),
                record: record.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}
