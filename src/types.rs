//! Shared types and the crate-wide error taxonomy.

use std::time::Duration;

/// Errors surfaced by the answering pipeline to its caller.
///
/// Module-level failures ([`crate::stores::StoreError`],
/// [`crate::providers::EmbedError`], [`crate::providers::GenerateError`]) are
/// converted into these categories at the pipeline boundary, so callers only
/// ever match on this enum.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// No readable documents, or every source failed extraction.
    #[error("ingestion produced no usable documents: {0}")]
    Ingestion(String),

    /// Embedding or persistence failed while building the index.
    #[error("index build failed: {0}")]
    IndexBuild(String),

    /// The index is unavailable or the query embedding failed.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The generation capability reported a failure.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The generation capability did not answer within its deadline.
    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// The question was malformed, empty, or oversized.
    #[error("invalid question: {0}")]
    Validation(String),
}

impl PipelineError {
    /// `true` when the failure category is a provider timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::GenerationTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_predicate_matches_only_timeouts() {
        assert!(PipelineError::GenerationTimeout(Duration::from_secs(30)).is_timeout());
        assert!(!PipelineError::Generation("boom".into()).is_timeout());
    }

    #[test]
    fn display_names_the_category() {
        let err = PipelineError::Ingestion("all sources failed".into());
        assert!(err.to_string().contains("no usable documents"));
    }
}
