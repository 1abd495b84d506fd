//! Gemini API surface used by the travel fleet.
//!
//! The rest of the workspace talks to the generative service through the
//! `TextEmbedder` and `LanguageModel` traits; `GeminiClient` is the HTTP
//! implementation of both.

pub mod config;
pub mod gemini;

pub use config::GenAiConfig;
pub use gemini::GeminiClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenAiError {
    #[error("API key is not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed API response: {0}")]
    MalformedResponse(String),
}

/// Task type for asymmetric embedding models.
///
/// Documents and queries must be embedded under distinct task types;
/// conflating them silently degrades recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTaskType {
    Document,
    Query,
}

impl EmbeddingTaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTaskType::Document => "RETRIEVAL_DOCUMENT",
            EmbeddingTaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Text embedding provider.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed `text` into a fixed-dimension vector.
    async fn embed(&self, text: &str, task_type: EmbeddingTaskType) -> Result<Vec<f32>, GenAiError>;

    /// Number of dimensions in every vector this embedder produces.
    fn dimensions(&self) -> usize;
}

/// Text generation provider used for synthesis and follow-up answers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenAiError>;
}
