//! OpenAI-compatible HTTP providers.
//!
//! Talks to any endpoint implementing the OpenAI `/embeddings` and
//! `/chat/completions` surface. Configuration comes from the environment
//! (`OPENAI_API_KEY`, optionally `OPENAI_BASE_URL` for compatible gateways)
//! or the builder. Requests carry per-call deadlines; a transport timeout is
//! reported as the distinct timeout error, everything else as a provider
//! error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{EmbedError, EmbeddingProvider, GenerateError, GenerationOptions, GenerationProvider};
use crate::prompt::AssembledPrompt;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Errors building an OpenAI client.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OpenAiConfigError {
    /// `OPENAI_API_KEY` was not set.
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    /// The base URL did not parse.
    #[error("invalid base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Connection settings shared by both providers.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    api_key: String,
    base_url: Url,
    embedding_model: String,
    embedding_dimensions: usize,
    chat_model: String,
    embed_timeout: Duration,
}

impl OpenAiConfig {
    /// Build a config with the given API key and default models/endpoint.
    ///
    /// # Errors
    ///
    /// Never fails for the defaults; kept fallible for parity with
    /// [`from_env`](Self::from_env).
    pub fn new(api_key: impl Into<String>) -> Result<Self, OpenAiConfigError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).map_err(|err| {
                OpenAiConfigError::InvalidBaseUrl {
                    url: DEFAULT_BASE_URL.to_owned(),
                    message: err.to_string(),
                }
            })?,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            chat_model: DEFAULT_CHAT_MODEL.to_owned(),
            embed_timeout: Duration::from_secs(30),
        })
    }

    /// Read `OPENAI_API_KEY` (and optional overrides) from the environment,
    /// loading `.env` first if present.
    ///
    /// Overrides: `OPENAI_BASE_URL`, `DOCLOOM_EMBEDDING_MODEL`,
    /// `DOCLOOM_CHAT_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenAiConfigError::MissingApiKey`] when no key is set and
    /// [`OpenAiConfigError::InvalidBaseUrl`] for an unparsable override.
    pub fn from_env() -> Result<Self, OpenAiConfigError> {
        let _ = dotenvy::dotenv();
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| OpenAiConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key)?;
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(&base)?;
        }
        if let Ok(model) = std::env::var("DOCLOOM_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(model) = std::env::var("DOCLOOM_CHAT_MODEL") {
            config.chat_model = model;
        }
        Ok(config)
    }

    /// Point at an OpenAI-compatible gateway.
    ///
    /// # Errors
    ///
    /// Returns [`OpenAiConfigError::InvalidBaseUrl`] when `base` fails to
    /// parse as an absolute URL.
    pub fn with_base_url(mut self, base: &str) -> Result<Self, OpenAiConfigError> {
        // A trailing slash matters for Url::join.
        let normalized = if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        };
        self.base_url =
            Url::parse(&normalized).map_err(|err| OpenAiConfigError::InvalidBaseUrl {
                url: base.to_owned(),
                message: err.to_string(),
            })?;
        Ok(self)
    }

    /// Override the embedding model and its output dimension.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.embedding_model = model.into();
        self.embedding_dimensions = dimensions;
        self
    }

    /// Override the chat model.
    #[must_use]
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Override the embedding request deadline.
    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url.join(path).map_err(|err| err.to_string())
    }
}

fn build_client() -> Result<reqwest::Client, OpenAiConfigError> {
    reqwest::Client::builder()
        .build()
        .map_err(|err| OpenAiConfigError::Client(err.to_string()))
}

// ── Embeddings ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding capability over the `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiEmbeddings {
    /// Build the provider from a config.
    ///
    /// # Errors
    ///
    /// Returns [`OpenAiConfigError::Client`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiConfigError> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = self
            .config
            .endpoint("embeddings")
            .map_err(EmbedError::Provider)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.embed_timeout)
            .json(&EmbeddingRequest {
                model: &self.config.embedding_model,
                input: [text],
            })
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EmbedError::Timeout(self.config.embed_timeout)
                } else {
                    EmbedError::Provider(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Provider(format!(
                "embeddings endpoint returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| EmbedError::Provider(err.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::Provider("embeddings response carried no data".into()))
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }
}

// ── Chat completions ───────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Generation capability over the `/chat/completions` endpoint.
///
/// The assembled instruction maps onto the chat layout: contract plus
/// serialized context as the system message, the bounded history as
/// alternating user/assistant messages, then the question.
pub struct OpenAiGeneration {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiGeneration {
    /// Build the provider from a config.
    ///
    /// # Errors
    ///
    /// Returns [`OpenAiConfigError::Client`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: OpenAiConfig) -> Result<Self, OpenAiConfigError> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    fn messages<'a>(&self, prompt: &AssembledPrompt) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(prompt.history.len() * 2 + 2);
        messages.push(ChatMessage {
            role: "system",
            content: format!(
                "{}\n\nAVAILABLE DOCUMENTS:\n{}",
                prompt.system,
                prompt.render_context()
            ),
        });
        for turn in &prompt.history {
            messages.push(ChatMessage {
                role: "user",
                content: turn.question.clone(),
            });
            messages.push(ChatMessage {
                role: "assistant",
                content: turn.answer.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.question.clone(),
        });
        messages
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGeneration {
    async fn generate(
        &self,
        prompt: &AssembledPrompt,
        options: &GenerationOptions,
    ) -> Result<String, GenerateError> {
        let url = self
            .config
            .endpoint("chat/completions")
            .map_err(GenerateError::Provider)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .timeout(options.timeout)
            .json(&ChatRequest {
                model: &self.config.chat_model,
                messages: self.messages(prompt),
                temperature: options.temperature,
                max_tokens: options.max_output_tokens,
            })
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GenerateError::Timeout(options.timeout)
                } else {
                    GenerateError::Provider(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Provider(format!(
                "chat endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| GenerateError::Provider(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError::Provider("chat response carried no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization_keeps_joins_working() {
        let config = OpenAiConfig::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1")
            .unwrap();
        assert_eq!(
            config.endpoint("embeddings").unwrap().as_str(),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            config.endpoint("chat/completions").unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = OpenAiConfig::new("sk-test")
            .unwrap()
            .with_base_url("not a url")
            .unwrap_err();
        assert!(matches!(err, OpenAiConfigError::InvalidBaseUrl { .. }));
    }
}
