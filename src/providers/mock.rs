//! Deterministic in-process providers for tests and demos.
//!
//! [`MockEmbeddingProvider`] embeds text as a normalized bag-of-tokens
//! vector, so lexically overlapping texts land close together in cosine
//! space, which is enough structure for retrieval tests without a model.
//! [`MockGenerationProvider::grounded`] emulates a generator that honours the
//! grounding contract: it answers extractively from the supplied passages and
//! falls back to the fixed refusal sentence when no passage shares a content
//! word with the question.

use std::hash::Hasher;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHasher;

use super::{EmbedError, EmbeddingProvider, GenerateError, GenerationOptions, GenerationProvider};
use crate::prompt::{AssembledPrompt, REFUSAL_TEXT};

const MOCK_DIMENSIONS: usize = 256;

/// Question words and glue that carry no topical signal.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "what", "when", "where",
    "which", "who", "whom", "how", "why", "of", "in", "on", "for", "to", "and", "or", "do",
    "does", "did", "it", "this", "that", "these", "those", "with", "from", "by", "at", "as",
    "about", "into", "can", "could", "will", "would", "should", "there", "their", "they",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn content_words(text: &str) -> Vec<String> {
    tokens(text)
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Deterministic bag-of-tokens embedder.
#[derive(Debug, Default, Clone)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
        for token in tokens(text) {
            let mut hasher = FxHasher::default();
            hasher.write(token.as_bytes());
            let bucket = (hasher.finish() % MOCK_DIMENSIONS as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }
}

enum Behavior {
    /// Extractive answers honouring the grounding contract.
    Grounded,
    /// Always return the same text.
    Fixed(String),
    /// Always fail.
    Failing(String),
    /// Sleep, then answer; for exercising deadlines.
    Delayed(Duration),
}

/// Scripted generation capability.
pub struct MockGenerationProvider {
    behavior: Behavior,
}

impl MockGenerationProvider {
    /// Answer extractively from the passages; refuse when none is topical.
    #[must_use]
    pub fn grounded() -> Self {
        Self {
            behavior: Behavior::Grounded,
        }
    }

    /// Always answer with `text`.
    #[must_use]
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fixed(text.into()),
        }
    }

    /// Always fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Failing(message.into()),
        }
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            behavior: Behavior::Delayed(delay),
        }
    }

    fn answer_grounded(prompt: &AssembledPrompt) -> String {
        let question_words = content_words(&prompt.question);
        let best = prompt
            .passages
            .iter()
            .map(|passage| {
                let passage_words = content_words(&passage.body);
                let overlap = question_words
                    .iter()
                    .filter(|w| passage_words.contains(w))
                    .count();
                (overlap, passage)
            })
            .max_by_key(|(overlap, _)| *overlap);

        match best {
            Some((overlap, passage)) if overlap > 0 => {
                format!("According to {}: {}", passage.origin, passage.body.trim())
            }
            _ => REFUSAL_TEXT.to_owned(),
        }
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        _options: &GenerationOptions,
    ) -> Result<String, GenerateError> {
        match &self.behavior {
            Behavior::Grounded => Ok(Self::answer_grounded(prompt)),
            Behavior::Fixed(text) => Ok(text.clone()),
            Behavior::Failing(message) => Err(GenerateError::Provider(message.clone())),
            Behavior::Delayed(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::answer_grounded(prompt))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::assemble;
    use crate::retrieval::RetrievedChunk;

    fn retrieved(origin: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: format!("{origin}#0.0"),
            origin: origin.to_owned(),
            chunk_index: 0,
            text: text.to_owned(),
            score: 0.8,
        }
    }

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalized() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("Admission exams are held in July").await.unwrap();
        let b = provider.embed("Admission exams are held in July").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), provider.dimensions());
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn different_texts_embed_differently() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("admission exams in July").await.unwrap();
        let b = provider.embed("scholarship deadlines in March").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn grounded_mock_answers_from_matching_passage() {
        let prompt = assemble(
            "when are admission exams?",
            &[retrieved("handbook.txt", "Admission exams are held in July.")],
            Vec::new(),
        );
        let answer = MockGenerationProvider::grounded()
            .generate(&prompt, &GenerationOptions::default())
            .await
            .unwrap();
        assert!(answer.contains("July"));
        assert!(answer.contains("handbook.txt"));
    }

    #[tokio::test]
    async fn grounded_mock_refuses_off_topic_context() {
        let prompt = assemble(
            "what is the admission exam format?",
            &[retrieved(
                "grants.txt",
                "Scholarship applications open in March for enrolled students.",
            )],
            Vec::new(),
        );
        let answer = MockGenerationProvider::grounded()
            .generate(&prompt, &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(answer, REFUSAL_TEXT);
    }

    #[tokio::test]
    async fn failing_mock_surfaces_a_provider_error() {
        let prompt = assemble("q", &[], Vec::new());
        let err = MockGenerationProvider::failing("upstream 500")
            .generate(&prompt, &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Provider(_)));
    }
}
