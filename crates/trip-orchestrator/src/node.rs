//! Workflow node: one subtask bound to a remote agent.

use crate::events::WorkflowChunk;
use crate::transport::{AgentConnector, TaskEvent, TaskMessage, TaskState};
use crate::OrchestrationError;
use agent_registry::{AgentDescriptor, ToolGateway};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Node key marking the distinguished planner node.
pub const PLANNER_NODE_KEY: &str = "planner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Ready,
    Running,
    Paused,
    Completed,
    Failed,
}

/// Outcome of driving a node's chunk stream to a stopping point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Completed,
    Paused,
}

/// Dependencies a node needs while executing. The gateway is the only
/// discovery surface; the connector is the only path to remote agents.
#[derive(Clone)]
pub struct NodeServices {
    pub gateway: Arc<dyn ToolGateway>,
    pub connector: Arc<dyn AgentConnector>,
}

/// Per-node execution attributes stored on the graph, not the node.
#[derive(Debug, Clone, Default)]
pub struct NodeAttributes {
    pub query: String,
    pub task_id: String,
    pub context_id: String,
}

/// A subtask bound (lazily) to a remote agent.
///
/// Nodes carry no reference back to the graph; the graph owns them by id.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: Uuid,
    pub task: String,
    pub node_key: Option<String>,
    pub node_label: Option<String>,
    pub state: NodeState,
    pub results: Option<Value>,
    pub descriptor: Option<AgentDescriptor>,
}

impl WorkflowNode {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            node_key: None,
            node_label: None,
            state: NodeState::Ready,
            results: None,
            descriptor: None,
        }
    }

    pub fn with_metadata(
        task: impl Into<String>,
        node_key: Option<String>,
        node_label: Option<String>,
    ) -> Self {
        Self {
            node_key,
            node_label,
            ..Self::new(task)
        }
    }

    pub fn is_planner(&self) -> bool {
        self.node_key.as_deref() == Some(PLANNER_NODE_KEY)
    }

    /// Display label: explicit label, or the task text.
    pub fn label(&self) -> &str {
        self.node_label.as_deref().unwrap_or(&self.task)
    }

    /// Resolve the remote agent for this node through the tool gateway.
    ///
    /// The planner is looked up by its fixed resource; every other node is
    /// discovered semantically from its task description.
    async fn bind_descriptor(
        &mut self,
        gateway: &dyn ToolGateway,
    ) -> Result<AgentDescriptor, OrchestrationError> {
        if let Some(descriptor) = &self.descriptor {
            return Ok(descriptor.clone());
        }

        let lookup = if self.is_planner() {
            gateway.planner_descriptor().await
        } else {
            gateway.find_agent(&self.task).await
        };

        match lookup {
            Ok(descriptor) => {
                tracing::info!(
                    node_id = %self.id,
                    agent = %descriptor.name,
                    url = %descriptor.url,
                    "node bound to agent"
                );
                self.descriptor = Some(descriptor.clone());
                Ok(descriptor)
            }
            Err(error) => {
                self.state = NodeState::Failed;
                Err(OrchestrationError::Discovery(error))
            }
        }
    }

    /// Execute this node: discover its agent if needed, open the streaming
    /// session and relay every chunk into `sink`.
    ///
    /// Returns `Paused` when the agent asks for input (or stops without a
    /// terminal state); `Completed` once the terminal chunk arrives, with
    /// `results` finalized from the last artifact. Transport errors and a
    /// `failed` status mark the node failed and propagate.
    pub async fn run(
        &mut self,
        services: &NodeServices,
        attrs: &NodeAttributes,
        sink: &mpsc::Sender<WorkflowChunk>,
    ) -> Result<NodeOutcome, OrchestrationError> {
        self.state = NodeState::Running;
        let descriptor = self.bind_descriptor(services.gateway.as_ref()).await?;

        let message = TaskMessage {
            query: attrs.query.clone(),
            task_id: attrs.task_id.clone(),
            context_id: attrs.context_id.clone(),
        };
        let mut stream = match services.connector.open_stream(&descriptor, message).await {
            Ok(stream) => stream,
            Err(error) => {
                self.state = NodeState::Failed;
                return Err(OrchestrationError::Transport(error));
            }
        };

        let mut completed = false;
        let mut last_artifact = None;
        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(error) => {
                    self.state = NodeState::Failed;
                    return Err(OrchestrationError::Transport(error));
                }
            };

            match event {
                TaskEvent::Status { state, message, last } => {
                    self.relay(
                        sink,
                        WorkflowChunk::status(self.id, state, message.clone(), last),
                    )
                    .await?;
                    match state {
                        TaskState::Completed => completed = true,
                        TaskState::InputRequired => {
                            tracing::info!(node_id = %self.id, "agent requires input, pausing");
                            self.state = NodeState::Paused;
                            return Ok(NodeOutcome::Paused);
                        }
                        TaskState::Failed => {
                            self.state = NodeState::Failed;
                            return Err(OrchestrationError::NodeFailed {
                                node_id: self.id,
                                message: message.unwrap_or_else(|| "remote task failed".to_string()),
                            });
                        }
                        TaskState::Working => {}
                    }
                }
                TaskEvent::Artifact { name, data } => {
                    last_artifact = Some(data.clone());
                    self.relay(sink, WorkflowChunk::artifact(self.id, name, data))
                        .await?;
                }
            }
        }

        if completed {
            self.results = last_artifact;
            self.state = NodeState::Completed;
            tracing::debug!(node_id = %self.id, "node completed");
            Ok(NodeOutcome::Completed)
        } else {
            // Stream ended without a terminal state; treat as awaiting input.
            self.state = NodeState::Paused;
            Ok(NodeOutcome::Paused)
        }
    }

    /// Run to a stopping point, relaying chunks into `shared` as they arrive
    /// and returning them collected. Used by parallel level execution.
    pub async fn run_with_result(
        &mut self,
        services: &NodeServices,
        attrs: &NodeAttributes,
        shared: mpsc::Sender<WorkflowChunk>,
    ) -> Result<(Uuid, Vec<WorkflowChunk>), OrchestrationError> {
        let (tx, mut rx) = mpsc::channel(16);
        let id = self.id;

        let run = async {
            let outcome = self.run(services, attrs, &tx).await;
            drop(tx);
            outcome
        };
        let forward = async move {
            let mut collected = Vec::new();
            while let Some(chunk) = rx.recv().await {
                // Caller hang-up only stops the relay, not the collection.
                let _ = shared.send(chunk.clone()).await;
                collected.push(chunk);
            }
            collected
        };

        let (outcome, collected) = tokio::join!(run, forward);
        outcome?;
        Ok((id, collected))
    }

    async fn relay(
        &mut self,
        sink: &mpsc::Sender<WorkflowChunk>,
        chunk: WorkflowChunk,
    ) -> Result<(), OrchestrationError> {
        if sink.send(chunk).await.is_err() {
            // The caller dropped the stream; leave the node resumable.
            self.state = NodeState::Paused;
            return Err(OrchestrationError::ChannelClosed);
        }
        Ok(())
    }
}
