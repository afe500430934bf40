//! Pipeline configuration.
//!
//! All tunables of the answering pipeline live here, grouped by stage.
//! Defaults reproduce the production settings this pipeline was tuned with:
//! 1500/300 chunking, MMR retrieval over a 20-candidate pool, a ten-turn
//! conversation window, and a 30 second generation deadline.
//!
//! Configuration is resolved in two layers (later wins):
//!
//! 1. Compiled defaults ([`PipelineConfig::default`])
//! 2. Environment variables (`DOCLOOM_*`, via [`PipelineConfig::from_env`])

use std::time::Duration;

/// Errors produced while validating or loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field pair violates an invariant (e.g. overlap >= size).
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// An environment variable was present but unparsable.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse { key: String, message: String },
}

/// Chunking stage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Hard upper bound on chunk length, in grapheme clusters.
    pub chunk_size: usize,
    /// Exact overlap carried between adjacent chunks of the same unit.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 300,
        }
    }
}

/// Retrieval stage settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the prompt assembler.
    pub top_k: usize,
    /// Size of the similarity candidate pool re-ranked for diversity.
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity.
    pub diversity_weight: f32,
    /// Optional similarity floor; candidates below it are dropped before
    /// prompting. `None` leaves topical gating entirely to the generator
    /// instruction.
    pub relevance_floor: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            fetch_k: 20,
            diversity_weight: 0.7,
            relevance_floor: None,
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum retained turns per session; oldest turns are evicted first.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// Generation stage settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline for a single generation call.
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 1000,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryConfig,
    pub generation: GenerationConfig,
    /// Deadline for a single embedding call (index build and query time).
    pub embedding_timeout: Duration,
    /// Questions longer than this are rejected before any provider call.
    pub max_question_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
            generation: GenerationConfig::default(),
            embedding_timeout: Duration::from_secs(30),
            max_question_chars: 1000,
        }
    }
}

impl PipelineConfig {
    /// Start building a configuration from compiled defaults.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load defaults, then apply `DOCLOOM_*` environment overrides.
    ///
    /// Recognized variables: `DOCLOOM_CHUNK_SIZE`, `DOCLOOM_CHUNK_OVERLAP`,
    /// `DOCLOOM_TOP_K`, `DOCLOOM_FETCH_K`, `DOCLOOM_DIVERSITY_WEIGHT`,
    /// `DOCLOOM_MAX_TURNS`, `DOCLOOM_GENERATION_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvParse`] for unparsable values and
    /// [`ConfigError::Invalid`] if the resulting configuration fails
    /// [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env loading; a missing file is not an error.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Some(v) = read_env("DOCLOOM_CHUNK_SIZE")? {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = read_env("DOCLOOM_CHUNK_OVERLAP")? {
            config.chunking.chunk_overlap = v;
        }
        if let Some(v) = read_env("DOCLOOM_TOP_K")? {
            config.retrieval.top_k = v;
        }
        if let Some(v) = read_env("DOCLOOM_FETCH_K")? {
            config.retrieval.fetch_k = v;
        }
        if let Some(v) = read_env::<f32>("DOCLOOM_DIVERSITY_WEIGHT")? {
            config.retrieval.diversity_weight = v;
        }
        if let Some(v) = read_env("DOCLOOM_MAX_TURNS")? {
            config.memory.max_turns = v;
        }
        if let Some(v) = read_env::<u64>("DOCLOOM_GENERATION_TIMEOUT_SECS")? {
            config.generation.timeout = Duration::from_secs(v);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `chunk_overlap >= chunk_size`,
    /// `chunk_size == 0`, `fetch_k < top_k`, `top_k == 0`, the diversity
    /// weight falls outside `[0, 1]`, or `max_turns == 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be > 0".into()));
        }
        if self.retrieval.fetch_k < self.retrieval.top_k {
            return Err(ConfigError::Invalid(format!(
                "fetch_k ({}) must be >= top_k ({})",
                self.retrieval.fetch_k, self.retrieval.top_k
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.diversity_weight) {
            return Err(ConfigError::Invalid(format!(
                "diversity_weight ({}) must lie in [0, 1]",
                self.retrieval.diversity_weight
            )));
        }
        if self.memory.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be > 0".into()));
        }
        Ok(())
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::EnvParse {
                key: key.to_owned(),
                message: err.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the chunk size (grapheme clusters).
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.chunk_size = size;
        self
    }

    /// Set the overlap between adjacent chunks.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks returned per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.retrieval.top_k = k;
        self
    }

    /// Set the similarity candidate pool size.
    pub fn fetch_k(mut self, fetch_k: usize) -> Self {
        self.config.retrieval.fetch_k = fetch_k;
        self
    }

    /// Set the relevance/diversity trade-off.
    pub fn diversity_weight(mut self, weight: f32) -> Self {
        self.config.retrieval.diversity_weight = weight;
        self
    }

    /// Drop retrieved candidates below this cosine similarity before prompting.
    pub fn relevance_floor(mut self, floor: f32) -> Self {
        self.config.retrieval.relevance_floor = Some(floor);
        self
    }

    /// Set the retained turn count per session.
    pub fn max_turns(mut self, turns: usize) -> Self {
        self.config.memory.max_turns = turns;
        self
    }

    /// Set generation sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.generation.temperature = temperature;
        self
    }

    /// Set the generation deadline.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation.timeout = timeout;
        self
    }

    /// Set the embedding deadline.
    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = timeout;
        self
    }

    /// Set the question length cap.
    pub fn max_question_chars(mut self, chars: usize) -> Self {
        self.config.max_question_chars = chars;
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on invariant violations.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
