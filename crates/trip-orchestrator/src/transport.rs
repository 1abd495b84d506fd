//! Streaming contract with remote agents.
//!
//! The network transport itself is external; the workflow layer sees only
//! this trait and the events it yields.

use agent_registry::AgentDescriptor;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open session with {url}: {message}")]
    Connect { url: String, message: String },

    #[error("stream error: {0}")]
    Stream(String),
}

/// Remote task status carried by streaming chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Working,
    InputRequired,
    Completed,
    Failed,
}

/// Message opening a streaming session with a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub query: String,
    pub task_id: String,
    pub context_id: String,
}

/// One chunk received from a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    /// Task status update; `last` marks the terminal chunk of the stream.
    Status {
        state: TaskState,
        message: Option<String>,
        last: bool,
    },
    /// Named payload emitted by the agent, usually at task completion.
    Artifact { name: String, data: Value },
}

pub type TaskEventStream = BoxStream<'static, Result<TaskEvent, TransportError>>;

/// Opens streaming sessions to remote agents.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn open_stream(
        &self,
        descriptor: &AgentDescriptor,
        message: TaskMessage,
    ) -> Result<TaskEventStream, TransportError>;
}
