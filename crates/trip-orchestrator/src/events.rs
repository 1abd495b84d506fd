//! Chunks streamed back to the caller.
//!
//! Sibling nodes in a parallel level interleave arbitrarily, so every chunk
//! is tagged with its originating node id.

use crate::transport::TaskState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub node_id: Uuid,
    pub state: TaskState,
    pub message: Option<String>,
    pub last: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactUpdate {
    pub node_id: Uuid,
    pub name: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Terminal synthesis event closing an orchestration round.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEvent {
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub enum WorkflowChunk {
    Status(StatusUpdate),
    Artifact(ArtifactUpdate),
    Summary(SummaryEvent),
}

impl WorkflowChunk {
    pub fn status(node_id: Uuid, state: TaskState, message: Option<String>, last: bool) -> Self {
        Self::Status(StatusUpdate {
            node_id,
            state,
            message,
            last,
            timestamp: Utc::now(),
        })
    }

    pub fn artifact(node_id: Uuid, name: String, data: Value) -> Self {
        Self::Artifact(ArtifactUpdate {
            node_id,
            name,
            data,
            timestamp: Utc::now(),
        })
    }

    pub fn summary(summary: String) -> Self {
        Self::Summary(SummaryEvent {
            summary,
            timestamp: Utc::now(),
        })
    }

    /// Originating node, if this chunk came from one.
    pub fn node_id(&self) -> Option<Uuid> {
        match self {
            Self::Status(update) => Some(update.node_id),
            Self::Artifact(update) => Some(update.node_id),
            Self::Summary(_) => None,
        }
    }
}
