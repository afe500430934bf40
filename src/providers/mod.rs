//! External model capabilities.
//!
//! The pipeline consumes two opaque capabilities: an embedding model and a
//! generation model. Both are trait objects so the core never depends on a
//! particular vendor. [`openai`] provides an OpenAI-compatible HTTP
//! implementation; [`mock`] provides deterministic in-process implementations
//! for tests and demos.

pub mod mock;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;

use crate::prompt::AssembledPrompt;

/// Errors from the embedding capability.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EmbedError {
    /// The provider did not answer within its deadline.
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider failed.
    #[error("embedding provider error: {0}")]
    Provider(String),
}

/// Errors from the generation capability.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// The provider did not answer within its deadline.
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider failed.
    #[error("generation provider error: {0}")]
    Provider(String),
}

/// Per-call generation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline the provider should enforce on its own request.
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 1000,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Embedding capability: text in, fixed-dimension vector out.
///
/// Implementations must be deterministic for identical input: the same text
/// embeds to the same vector at indexing time and at query time.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text span.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Dimension of every vector this provider produces.
    fn dimensions(&self) -> usize;
}

/// Generation capability: structured instruction in, answer text out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate one answer. Called at most once per question; retries, if
    /// any, belong to the caller of the pipeline.
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<String, GenerateError>;
}
