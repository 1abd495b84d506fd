//! HTTP client for the Gemini `embedContent` and `generateContent` endpoints.

use crate::{EmbeddingTaskType, GenAiConfig, GenAiError, LanguageModel, TextEmbedder};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GenAiConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    text: String,
}

impl GeminiClient {
    pub fn new(config: GenAiConfig) -> Result<Self, GenAiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self, GenAiError> {
        Self::new(GenAiConfig::from_env())
    }

    pub fn config(&self) -> &GenAiConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, GenAiError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(GenAiError::MissingApiKey)
    }

    async fn post(
        &self,
        model: &str,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError> {
        let url = format!("{}/models/{}:{}", self.config.base_url, model, operation);
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenAiError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TextEmbedder for GeminiClient {
    async fn embed(&self, text: &str, task_type: EmbeddingTaskType) -> Result<Vec<f32>, GenAiError> {
        let body = json!({
            "content": { "parts": [ { "text": text } ] },
            "taskType": task_type.as_str(),
            "outputDimensionality": self.config.embedding_dimensions,
        });

        let raw = self
            .post(&self.config.embedding_model, "embedContent", body)
            .await?;
        let parsed: EmbedResponse = serde_json::from_value(raw)
            .map_err(|e| GenAiError::MalformedResponse(e.to_string()))?;

        let values = parsed.embedding.values;
        if values.len() != self.config.embedding_dimensions {
            return Err(GenAiError::MalformedResponse(format!(
                "expected {} dimensions, got {}",
                self.config.embedding_dimensions,
                values.len()
            )));
        }
        tracing::debug!(
            model = %self.config.embedding_model,
            task_type = task_type.as_str(),
            "generated embedding"
        );
        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenAiError> {
        let body = json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
        });

        let raw = self.post(&self.config.model, "generateContent", body).await?;
        let parsed: GenerateResponse = serde_json::from_value(raw)
            .map_err(|e| GenAiError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GenAiError::MalformedResponse("no candidates returned".to_string()))?;

        tracing::debug!(model = %self.config.model, chars = text.len(), "generated text");
        Ok(text)
    }
}
