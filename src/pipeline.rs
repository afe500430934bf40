//! The answering pipeline: build an index, answer questions against it.
//!
//! One [`AnswerPipeline`] serves any number of concurrent questions; within a
//! single call the stages run strictly in sequence: validate, embed the
//! question, retrieve, assemble the prompt, generate, append the turn to the
//! session's memory. The index travels as an explicit handle: building
//! produces a [`BuiltIndex`] which the caller installs into an [`IndexSlot`];
//! `answer` fails fast with a retrieval error while the slot is empty instead
//! of rebuilding anything behind the caller's back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::config::PipelineConfig;
use crate::conversation::SessionStore;
use crate::index::EmbeddingIndex;
use crate::loader::{DocumentSource, load_documents};
use crate::prompt::assemble;
use crate::providers::{EmbeddingProvider, GenerateError, GenerationOptions, GenerationProvider};
use crate::retrieval::{RetrievalError, Retriever};
use crate::stores::VectorStore;
use crate::types::PipelineError;

/// An immutable, fully built index with its provenance counts.
#[derive(Debug)]
pub struct BuiltIndex {
    index: EmbeddingIndex,
    build_id: Uuid,
    document_count: usize,
    chunk_count: usize,
    built_at: DateTime<Utc>,
}

impl BuiltIndex {
    /// The searchable index.
    #[must_use]
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Number of documents that went into this build.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Number of chunks indexed.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// When this build finished.
    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Identifier of this build, for log correlation.
    #[must_use]
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }
}

/// Caller-owned slot holding the current index handle.
///
/// Installing a new build swaps the handle atomically; calls already running
/// keep the handle they started with, so a rebuild never exposes a partially
/// deleted index to in-flight searches.
#[derive(Default)]
pub struct IndexSlot {
    inner: RwLock<Option<Arc<BuiltIndex>>>,
}

impl IndexSlot {
    /// An empty slot; `answer` against it fails with a retrieval error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly built index, returning the previous one.
    pub fn install(&self, built: Arc<BuiltIndex>) -> Option<Arc<BuiltIndex>> {
        self.inner.write().replace(built)
    }

    /// The current handle, if any build has been installed.
    #[must_use]
    pub fn current(&self) -> Option<Arc<BuiltIndex>> {
        self.inner.read().clone()
    }

    /// `true` once a build has been installed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }
}

/// A completed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// The generated (or refusal) text.
    pub text: String,
    /// Distinct source documents represented in the retrieved context.
    pub cited_sources: usize,
}

/// Pipeline liveness summary for the hosting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Whether an index build has been installed.
    pub index_ready: bool,
    /// Documents in the current build (0 while not ready).
    pub document_count: usize,
}

/// The retrieval-augmented answering pipeline.
pub struct AnswerPipeline {
    config: PipelineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    chunker: Chunker,
    retriever: Retriever,
    sessions: SessionStore,
}

impl AnswerPipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> AnswerPipelineBuilder {
        AnswerPipelineBuilder::default()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load, chunk, embed, and index the given sources into `store`.
    ///
    /// The store's prior contents are deleted before insertion, so the
    /// resulting index reflects exactly this document set. Unreadable sources
    /// are skipped (and logged); only an entirely empty result set fails.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Ingestion`] when no source yields usable text;
    /// [`PipelineError::IndexBuild`] when embedding or persistence fails.
    pub async fn build_index(
        &self,
        sources: &[Box<dyn DocumentSource>],
        store: Arc<dyn VectorStore>,
    ) -> Result<Arc<BuiltIndex>, PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::Ingestion("no document sources given".into()));
        }
        let documents = load_documents(sources).await;
        if documents.is_empty() {
            return Err(PipelineError::Ingestion(format!(
                "all {} sources failed extraction",
                sources.len()
            )));
        }

        let chunks = self.chunker.split_documents(&documents);
        if chunks.is_empty() {
            return Err(PipelineError::Ingestion(
                "documents contained no chunkable text".into(),
            ));
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let embedding = tokio::time::timeout(
                self.config.embedding_timeout,
                self.embedder.embed(&chunk.text),
            )
            .await
            .map_err(|_| {
                PipelineError::IndexBuild(format!(
                    "embedding '{}' timed out after {:?}",
                    chunk.id, self.config.embedding_timeout
                ))
            })?
            .map_err(|err| PipelineError::IndexBuild(err.to_string()))?;
            embeddings.push(embedding);
        }

        let index = EmbeddingIndex::new(store);
        index
            .rebuild(&chunks, embeddings)
            .await
            .map_err(|err| PipelineError::IndexBuild(err.to_string()))?;

        let built = BuiltIndex {
            index,
            build_id: Uuid::new_v4(),
            document_count: documents.len(),
            chunk_count: chunks.len(),
            built_at: Utc::now(),
        };
        tracing::info!(
            build_id = %built.build_id,
            documents = built.document_count,
            chunks = built.chunk_count,
            "index built"
        );
        Ok(Arc::new(built))
    }

    /// Answer `question` for `session_id` against the index in `slot`.
    ///
    /// On success the turn is appended to the session's memory; a failed call
    /// leaves the memory untouched.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Validation`] for an empty or oversized question,
    /// [`PipelineError::Retrieval`] while no index is installed or when
    /// embedding/search fails, and
    /// [`PipelineError::Generation`]/[`PipelineError::GenerationTimeout`]
    /// from the generation capability, propagated without retry.
    pub async fn answer(
        &self,
        session_id: &str,
        question: &str,
        slot: &IndexSlot,
    ) -> Result<Answer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::Validation("question is empty".into()));
        }
        let question_chars = question.chars().count();
        if question_chars > self.config.max_question_chars {
            return Err(PipelineError::Validation(format!(
                "question is {question_chars} characters, limit is {}",
                self.config.max_question_chars
            )));
        }

        let built = slot.current().ok_or_else(|| {
            PipelineError::Retrieval("no index has been built".into())
        })?;

        let retrieved = self
            .retriever
            .retrieve(built.index(), question)
            .await
            .map_err(|err: RetrievalError| PipelineError::Retrieval(err.to_string()))?;

        let memory = self.sessions.session(session_id);
        let history = memory.lock().history();
        let prompt = assemble(question, &retrieved, history);
        let cited_sources = prompt.cited_source_count();

        let options = GenerationOptions {
            max_output_tokens: self.config.generation.max_output_tokens,
            temperature: self.config.generation.temperature,
            timeout: self.config.generation.timeout,
        };
        let text = tokio::time::timeout(
            self.config.generation.timeout,
            self.generator.generate(&prompt, &options),
        )
        .await
        .map_err(|_| PipelineError::GenerationTimeout(self.config.generation.timeout))?
        .map_err(|err| match err {
            GenerateError::Timeout(d) => PipelineError::GenerationTimeout(d),
            GenerateError::Provider(message) => PipelineError::Generation(message),
        })?;

        memory.lock().append(question, text.as_str());
        tracing::info!(
            session = session_id,
            cited_sources,
            answer_chars = text.chars().count(),
            "answer generated"
        );
        Ok(Answer {
            text,
            cited_sources,
        })
    }

    /// Clear the conversation history of `session_id`.
    pub fn reset_session(&self, session_id: &str) {
        self.sessions.reset(session_id);
    }

    /// Liveness summary against the given slot.
    #[must_use]
    pub fn health(&self, slot: &IndexSlot) -> Health {
        match slot.current() {
            Some(built) => Health {
                index_ready: true,
                document_count: built.document_count(),
            },
            None => Health {
                index_ready: false,
                document_count: 0,
            },
        }
    }
}

/// Builder for [`AnswerPipeline`].
#[derive(Default)]
#[must_use]
pub struct AnswerPipelineBuilder {
    config: Option<PipelineConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn GenerationProvider>>,
}

impl AnswerPipelineBuilder {
    /// Set the embedding capability. Required.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the generation capability. Required.
    pub fn generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the configuration (defaults otherwise).
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Validate and assemble the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the missing capability, or the
    /// configuration validation failure.
    pub fn build(self) -> Result<AnswerPipeline, PipelineError> {
        let embedder = self
            .embedder
            .ok_or_else(|| PipelineError::Validation("pipeline needs an embedder".into()))?;
        let generator = self
            .generator
            .ok_or_else(|| PipelineError::Validation("pipeline needs a generator".into()))?;
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|err| PipelineError::Validation(err.to_string()))?;

        let chunker = Chunker::new(config.chunking.clone());
        let retriever = Retriever::new(
            Arc::clone(&embedder),
            &config.retrieval,
            config.embedding_timeout,
        );
        let sessions = SessionStore::new(config.memory.max_turns);
        Ok(AnswerPipeline {
            config,
            embedder,
            generator,
            chunker,
            retriever,
            sessions,
        })
    }
}
