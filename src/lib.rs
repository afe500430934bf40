//! # docloom: grounded retrieval-augmented answering
//!
//! Ingests a document corpus, indexes it for semantic retrieval, and answers
//! questions strictly from what was retrieved, with a fixed refusal sentence
//! when the corpus has nothing to say.
//!
//! ```text
//! Document sources ──► loader ──► chunker ──► EmbeddingIndex ──► VectorStore
//!                                                  ▲                (memory | sqlite)
//!                                                  │
//! Question ──► Retriever (embed + MMR search) ─────┘
//!                   │
//!                   ▼
//! ConversationMemory ──► prompt::assemble ──► GenerationProvider ──► Answer
//!         ▲                                                            │
//!         └────────────────── turn appended ◄──────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docloom::loader::{DocumentSource, TextSource};
//! use docloom::pipeline::{AnswerPipeline, IndexSlot};
//! use docloom::providers::mock::{MockEmbeddingProvider, MockGenerationProvider};
//! use docloom::stores::InMemoryVectorStore;
//!
//! let pipeline = AnswerPipeline::builder()
//!     .embedder(Arc::new(MockEmbeddingProvider::new()))
//!     .generator(Arc::new(MockGenerationProvider::grounded()))
//!     .build()?;
//!
//! let sources: Vec<Box<dyn DocumentSource>> = vec![Box::new(TextSource::new(
//!     "handbook.txt",
//!     "Admission exams are held in July.",
//! ))];
//!
//! let slot = IndexSlot::new();
//! let built = pipeline
//!     .build_index(&sources, Arc::new(InMemoryVectorStore::new()))
//!     .await?;
//! slot.install(built);
//!
//! let answer = pipeline.answer("session-1", "when are admission exams?", &slot).await?;
//! assert!(answer.cited_sources >= 1);
//! ```

pub mod chunker;
pub mod config;
pub mod conversation;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod retrieval;
pub mod stores;
pub mod types;

pub use chunker::{Chunk, Chunker};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use conversation::{ConversationMemory, SessionStore, Turn};
pub use index::{EmbeddingIndex, SearchParams};
pub use loader::{Document, DocumentSource, FileSource, TextSource};
pub use pipeline::{Answer, AnswerPipeline, BuiltIndex, Health, IndexSlot};
pub use prompt::{AssembledPrompt, REFUSAL_TEXT};
pub use providers::{EmbeddingProvider, GenerationProvider};
pub use retrieval::{RetrievedChunk, Retriever};
pub use stores::{InMemoryVectorStore, VectorStore};
pub use types::PipelineError;
