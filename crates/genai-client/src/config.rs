//! Environment-driven configuration for the Gemini client.

use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

#[derive(Debug, Clone)]
pub struct GenAiConfig {
    /// API key; `None` degrades every dependent path instead of failing.
    pub api_key: Option<String>,
    /// Generation model used for summaries and Q&A.
    pub model: String,
    /// Embedding model backing the capability index.
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GenAiConfig {
    /// Read configuration from the recognized environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimensions: defaults.embedding_dimensions,
            base_url: defaults.base_url,
            timeout: defaults.timeout,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
