//! Agent descriptor model.

use serde::{Deserialize, Serialize};

/// Metadata describing a remote agent: identity, endpoint, capabilities.
///
/// One descriptor is loaded per card file; capability entries are free-form
/// objects owned by the remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub url: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<serde_json::Value>,
}

impl AgentDescriptor {
    /// Canonical string form used for document embeddings.
    pub fn embedding_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{} {}", self.name, self.description))
    }
}
