//! Shared fixtures for registry integration tests.

use async_trait::async_trait;
use genai_client::{EmbeddingTaskType, GenAiError, TextEmbedder};
use std::fs;
use std::path::Path;

pub const DIMENSIONS: usize = 768;

/// Deterministic embedder projecting text onto a few keyword axes, so
/// nearest-neighbor behavior is predictable without a remote service.
pub struct KeywordEmbedder;

#[async_trait]
impl TextEmbedder for KeywordEmbedder {
    async fn embed(&self, text: &str, _task_type: EmbeddingTaskType) -> Result<Vec<f32>, GenAiError> {
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0; DIMENSIONS];
        for (axis, keyword) in ["flight", "hotel", "car", "plan"].iter().enumerate() {
            if lowered.contains(keyword) {
                vector[axis] = 1.0;
            }
        }
        // Give unrelated text a shared component so scores are never all zero.
        vector[DIMENSIONS - 1] = 0.1;
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Embedder that maps every text to the same vector; useful for tie tests.
pub struct ConstantEmbedder;

#[async_trait]
impl TextEmbedder for ConstantEmbedder {
    async fn embed(&self, _text: &str, _task_type: EmbeddingTaskType) -> Result<Vec<f32>, GenAiError> {
        Ok(vec![1.0; DIMENSIONS])
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Embedder that always fails, standing in for a missing API key.
pub struct OfflineEmbedder;

#[async_trait]
impl TextEmbedder for OfflineEmbedder {
    async fn embed(&self, _text: &str, _task_type: EmbeddingTaskType) -> Result<Vec<f32>, GenAiError> {
        Err(GenAiError::MissingApiKey)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

pub fn write_card(dir: &Path, file_name: &str, name: &str, url: &str, description: &str) {
    let card = serde_json::json!({
        "name": name,
        "url": url,
        "description": description,
        "capabilities": []
    });
    fs::write(dir.join(file_name), card.to_string()).unwrap();
}
