//! Capability registry: agent descriptors indexed by semantic embedding.
//!
//! The index is built once at startup and immutable afterwards; concurrent
//! readers need no synchronization.

use crate::{AgentDescriptor, RegistryError};
use genai_client::{EmbeddingTaskType, TextEmbedder};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar file holding precomputed card embeddings, keyed by card URI.
const EMBEDDING_CACHE_FILE: &str = ".card_embeddings.json";

/// One indexed agent card.
#[derive(Debug, Clone)]
pub struct DescriptorRow {
    pub uri: String,
    pub descriptor: AgentDescriptor,
    pub embedding: Array1<f32>,
}

/// Append-only descriptor index answering nearest-neighbor lookups.
pub struct CapabilityRegistry {
    rows: Vec<DescriptorRow>,
    dimensions: usize,
}

/// Precomputed embeddings persisted next to the card files, so discovery
/// keeps working when the embedding service is unreachable.
struct EmbeddingCache {
    path: PathBuf,
    entries: HashMap<String, Vec<f32>>,
    dirty: bool,
}

impl EmbeddingCache {
    fn load(dir: &Path) -> Self {
        let path = dir.join(EMBEDDING_CACHE_FILE);
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            path,
            entries,
            dirty: false,
        }
    }

    fn get(&self, uri: &str, dimensions: usize) -> Option<Vec<f32>> {
        self.entries
            .get(uri)
            .filter(|v| v.len() == dimensions)
            .cloned()
    }

    fn insert(&mut self, uri: String, embedding: Vec<f32>) {
        self.entries.insert(uri, embedding);
        self.dirty = true;
    }

    fn persist(&self) {
        if !self.dirty {
            return;
        }
        match serde_json::to_string(&self.entries) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.path, text) {
                    tracing::warn!(path = %self.path.display(), %error, "failed to persist embedding cache");
                }
            }
            Err(error) => {
                tracing::warn!(%error, "failed to serialize embedding cache");
            }
        }
    }
}

impl CapabilityRegistry {
    /// Scan `dir` non-recursively and build the index.
    ///
    /// Malformed card files are skipped with a warning; an empty directory
    /// yields an empty index. Cards whose embedding can be neither loaded
    /// from the cache nor computed are skipped as well.
    pub async fn load(
        dir: &Path,
        embedder: &dyn TextEmbedder,
    ) -> Result<Self, RegistryError> {
        let dimensions = embedder.dimensions();
        let mut cache = EmbeddingCache::load(dir);
        let mut rows = Vec::new();

        let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension().map(|ext| ext == "json").unwrap_or(false)
                        // Dotfiles (including the embedding cache) are not cards.
                        && p.file_name()
                            .and_then(|name| name.to_str())
                            .map(|name| !name.starts_with('.'))
                            .unwrap_or(false)
                })
                .collect(),
            Err(error) => {
                tracing::warn!(dir = %dir.display(), %error, "agent card directory not readable");
                return Ok(Self { rows, dimensions });
            }
        };
        // Deterministic row order; ties in `find` break to the lowest index.
        files.sort();

        for path in files {
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let uri = format!("resource://agent_cards/{slug}");

            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable agent card");
                    continue;
                }
            };
            let descriptor: AgentDescriptor = match serde_json::from_str(&text) {
                Ok(descriptor) => descriptor,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping malformed agent card");
                    continue;
                }
            };

            let embedding = match cache.get(&uri, dimensions) {
                Some(cached) => cached,
                None => match embedder
                    .embed(&descriptor.embedding_text(), EmbeddingTaskType::Document)
                    .await
                {
                    Ok(vector) => {
                        cache.insert(uri.clone(), vector.clone());
                        vector
                    }
                    Err(error) => {
                        tracing::warn!(%uri, %error, "skipping card without embedding");
                        continue;
                    }
                },
            };

            rows.push(DescriptorRow {
                uri,
                descriptor,
                embedding: Array1::from(embedding),
            });
        }

        cache.persist();
        tracing::info!(cards = rows.len(), dir = %dir.display(), "capability registry loaded");
        Ok(Self { rows, dimensions })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// URIs of every indexed card, in index order.
    pub fn uris(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.uri.clone()).collect()
    }

    /// Fetch a card by its full `resource://agent_cards/<slug>` URI.
    pub fn get(&self, uri: &str) -> Result<&DescriptorRow, RegistryError> {
        self.rows
            .iter()
            .find(|r| r.uri == uri)
            .ok_or_else(|| RegistryError::NotFound(format!("agent card {uri}")))
    }

    /// Return the card whose embedding maximizes the dot product against the
    /// query embedding. Ties break to the lowest row index.
    pub async fn find(
        &self,
        query: &str,
        embedder: &dyn TextEmbedder,
    ) -> Result<&DescriptorRow, RegistryError> {
        if self.rows.is_empty() {
            return Err(RegistryError::NotFound(
                "no agent cards are indexed".to_string(),
            ));
        }

        let query_embedding =
            Array1::from(embedder.embed(query, EmbeddingTaskType::Query).await?);

        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (index, row) in self.rows.iter().enumerate() {
            let score = row.embedding.dot(&query_embedding);
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        let best = &self.rows[best_index];
        tracing::debug!(query, uri = %best.uri, score = best_score, "agent matched");
        Ok(best)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}
