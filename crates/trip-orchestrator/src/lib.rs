//! Fleet orchestration core for travel planning.
//!
//! A user query is decomposed by a remote planner agent into subtasks; each
//! subtask becomes a workflow node bound to a discovered worker agent. The
//! workflow graph executes sequentially or level-by-level in parallel,
//! streaming status and artifact chunks back to the caller, and the
//! orchestrator aggregates worker output into a final synthesis.

pub mod events;
pub mod graph;
pub mod node;
pub mod orchestrator;
pub mod parallel;
pub mod transport;

pub use events::{ArtifactUpdate, StatusUpdate, SummaryEvent, WorkflowChunk};
pub use graph::{WorkflowGraph, WorkflowRunOutcome, WorkflowState};
pub use node::{NodeAttributes, NodeOutcome, NodeServices, NodeState, WorkflowNode};
pub use orchestrator::{Orchestrator, Phase, PlannedTask, TaskPlan, UserAnswer};
pub use parallel::{analyze_task_dependencies, parallel_orchestrator, TaskCategory};
pub use transport::{AgentConnector, TaskEvent, TaskEventStream, TaskMessage, TaskState, TransportError};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("query cannot be empty")]
    EmptyQuery,

    #[error("invalid node IDs")]
    InvalidNodeIds,

    #[error("edge would create a cycle")]
    CycleDetected,

    #[error("unknown node {0}")]
    UnknownNode(Uuid),

    #[error("agent discovery failed: {0}")]
    Discovery(#[from] agent_registry::RegistryError),

    #[error("transport failure: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("node {node_id} failed: {message}")]
    NodeFailed { node_id: Uuid, message: String },

    #[error("malformed planner output: {0}")]
    MalformedPlan(String),

    #[error("language model failure: {0}")]
    Llm(#[from] genai_client::GenAiError),

    #[error("workflow execution failed: {0}")]
    Execution(String),

    #[error("output channel closed by caller")]
    ChannelClosed,
}
