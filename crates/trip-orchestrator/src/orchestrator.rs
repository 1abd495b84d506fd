//! Orchestrator: drives the workflow graph through the planner → discovery →
//! execute phases, aggregates worker artifacts and produces a final
//! synthesis.

use crate::events::WorkflowChunk;
use crate::graph::{WorkflowGraph, WorkflowRunOutcome, WorkflowState, DEFAULT_PARALLEL_THRESHOLD};
use crate::node::{NodeAttributes, NodeServices, NodeState, WorkflowNode, PLANNER_NODE_KEY};
use crate::parallel::analyze_task_dependencies;
use crate::OrchestrationError;
use genai_client::LanguageModel;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Orchestration phase for one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Planning,
    Expanding,
    Executing,
    AwaitingInput,
    Summarizing,
}

/// Events moving the phase machine forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseSignal {
    QueryReceived,
    PlanReady,
    NodesMaterialized,
    WorkerPaused,
    InputReceived,
    WorkComplete,
    SummaryDone,
}

impl Phase {
    fn advance(self, signal: PhaseSignal) -> Phase {
        use Phase::*;
        use PhaseSignal::*;
        match (self, signal) {
            (Idle, QueryReceived) => Planning,
            (Planning, PlanReady) | (Executing, PlanReady) => Expanding,
            (Expanding, NodesMaterialized) => Executing,
            (Planning, WorkerPaused) | (Executing, WorkerPaused) => AwaitingInput,
            (AwaitingInput, InputReceived) => Executing,
            (Executing, WorkComplete) | (Planning, WorkComplete) => Summarizing,
            (Summarizing, SummaryDone) => Idle,
            (phase, _) => phase,
        }
    }
}

/// Structured output of the planner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    #[serde(default)]
    pub trip_info: Map<String, Value>,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub description: String,
}

/// Answer contract for follow-up questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnswer {
    pub can_answer: String,
    pub answer: String,
}

pub struct Orchestrator {
    pub agent_name: String,
    pub description: String,
    pub enable_parallel: bool,
    pub parallel_threshold: usize,

    services: NodeServices,
    llm: Arc<dyn LanguageModel>,

    pub context_id: Option<String>,
    pub query_history: Vec<String>,
    pub results: Vec<Value>,
    pub travel_context: Map<String, Value>,
    pub graph: Option<WorkflowGraph>,

    phase: Phase,
    planner_node_id: Option<Uuid>,
    expanded: bool,
    harvested: HashSet<Uuid>,
}

impl Orchestrator {
    pub fn new(services: NodeServices, llm: Arc<dyn LanguageModel>) -> Self {
        Self::with_options(
            services,
            llm,
            false,
            DEFAULT_PARALLEL_THRESHOLD,
            "Orchestrator Agent",
        )
    }

    pub(crate) fn with_options(
        services: NodeServices,
        llm: Arc<dyn LanguageModel>,
        enable_parallel: bool,
        parallel_threshold: usize,
        agent_name: &str,
    ) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            description: "Facilitate inter agent communication".to_string(),
            enable_parallel,
            parallel_threshold,
            services,
            llm,
            context_id: None,
            query_history: Vec::new(),
            results: Vec::new(),
            travel_context: Map::new(),
            graph: None,
            phase: Phase::Idle,
            planner_node_id: None,
            expanded: false,
            harvested: HashSet::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Drop all per-conversation state. Called on every context change; the
    /// sole way state is discarded.
    pub fn clear_state(&mut self) {
        self.graph = None;
        self.results.clear();
        self.travel_context.clear();
        self.query_history.clear();
        self.planner_node_id = None;
        self.expanded = false;
        self.harvested.clear();
        self.phase = Phase::Idle;
    }

    /// Append a node to the active graph, set its execution attributes and
    /// optionally wire it from a parent node.
    pub fn add_graph_node(
        &mut self,
        task_id: &str,
        context_id: &str,
        query: &str,
        parent: Option<Uuid>,
        node_key: Option<&str>,
        node_label: Option<&str>,
    ) -> Result<Uuid, OrchestrationError> {
        let graph = self
            .graph
            .as_mut()
            .ok_or_else(|| OrchestrationError::Execution("no active workflow graph".to_string()))?;

        let node = WorkflowNode::with_metadata(
            query,
            node_key.map(String::from),
            node_label.map(String::from),
        );
        let id = graph.add_node(node);
        graph.set_node_attributes(
            id,
            NodeAttributes {
                query: query.to_string(),
                task_id: task_id.to_string(),
                context_id: context_id.to_string(),
            },
        )?;
        if let Some(parent) = parent {
            graph.add_edge(parent, id)?;
        }
        Ok(id)
    }

    /// Entry point for one caller query. Chunks stream into `sink`; the call
    /// returns once the round completes, pauses for input, or fails.
    pub async fn stream(
        &mut self,
        query: &str,
        context_id: &str,
        task_id: &str,
        sink: mpsc::Sender<WorkflowChunk>,
    ) -> Result<(), OrchestrationError> {
        if query.trim().is_empty() {
            return Err(OrchestrationError::EmptyQuery);
        }

        if self.context_id.as_deref() != Some(context_id) {
            tracing::info!(context_id, "context changed, clearing orchestrator state");
            self.clear_state();
            self.context_id = Some(context_id.to_string());
        }
        self.query_history.push(query.to_string());

        let resuming = self
            .graph
            .as_ref()
            .map(|graph| graph.state == WorkflowState::Paused)
            .unwrap_or(false);

        if resuming {
            let graph = self.graph.as_mut().ok_or_else(|| {
                OrchestrationError::Execution("no active workflow graph".to_string())
            })?;
            let paused = graph.paused_node_id.ok_or_else(|| {
                OrchestrationError::Execution("paused workflow has no paused node".to_string())
            })?;
            // The caller's answer becomes the paused node's new input.
            graph.set_node_query(paused, query)?;
            self.phase = self.phase.advance(PhaseSignal::InputReceived);
        } else {
            self.graph = Some(WorkflowGraph::with_threshold(self.parallel_threshold));
            self.planner_node_id = None;
            self.expanded = false;
            self.harvested.clear();
            let planner = self.add_graph_node(
                task_id,
                context_id,
                query,
                None,
                Some(PLANNER_NODE_KEY),
                Some("Planner"),
            )?;
            self.planner_node_id = Some(planner);
            self.phase = self.phase.advance(PhaseSignal::QueryReceived);
        }

        self.drive(task_id, context_id, &sink).await
    }

    /// Run the graph to its next stopping point, expanding it once the
    /// planner's artifact arrives, then synthesize.
    async fn drive(
        &mut self,
        task_id: &str,
        context_id: &str,
        sink: &mpsc::Sender<WorkflowChunk>,
    ) -> Result<(), OrchestrationError> {
        let services = self.services.clone();

        loop {
            let graph = self.graph.as_mut().ok_or_else(|| {
                OrchestrationError::Execution("no active workflow graph".to_string())
            })?;
            let outcome = if self.enable_parallel {
                graph.run_workflow_levels(&services, None, sink).await?
            } else {
                graph.run_workflow(&services, None, sink).await?
            };

            match outcome {
                WorkflowRunOutcome::Paused { node_id } => {
                    self.harvest_results();
                    self.phase = self.phase.advance(PhaseSignal::WorkerPaused);
                    tracing::info!(node_id = %node_id, "orchestration awaiting caller input");
                    return Ok(());
                }
                WorkflowRunOutcome::Completed => {
                    if !self.expanded && self.planner_completed() {
                        let plan = self.parse_plan()?;
                        self.phase = self.phase.advance(PhaseSignal::PlanReady);
                        self.expand(&plan, task_id, context_id)?;
                        self.expanded = true;
                        self.phase = self.phase.advance(PhaseSignal::NodesMaterialized);
                        continue;
                    }
                    self.harvest_results();
                    break;
                }
            }
        }

        self.phase = self.phase.advance(PhaseSignal::WorkComplete);
        let summary = match self.generate_summary().await {
            Ok(summary) => summary,
            Err(error) => {
                tracing::warn!(%error, "summary generation failed, returning partial results");
                format!(
                    "A summary could not be generated; {} result(s) were collected.",
                    self.results.len()
                )
            }
        };
        if sink.send(WorkflowChunk::summary(summary)).await.is_err() {
            return Err(OrchestrationError::ChannelClosed);
        }
        self.phase = self.phase.advance(PhaseSignal::SummaryDone);
        Ok(())
    }

    fn planner_completed(&self) -> bool {
        self.planner_node_id
            .and_then(|id| self.graph.as_ref().and_then(|graph| graph.node(id)))
            .map(|node| node.state == NodeState::Completed)
            .unwrap_or(false)
    }

    /// Parse the planner artifact as `{trip_info, tasks: [{description}]}`.
    fn parse_plan(&mut self) -> Result<TaskPlan, OrchestrationError> {
        let planner_id = self.planner_node_id.ok_or_else(|| {
            OrchestrationError::Execution("no planner node in workflow".to_string())
        })?;
        let graph = self.graph.as_mut().ok_or_else(|| {
            OrchestrationError::Execution("no active workflow graph".to_string())
        })?;
        let artifact = graph.node(planner_id).and_then(|node| node.results.clone());

        let failed = |graph: &mut WorkflowGraph, message: String| {
            graph.state = WorkflowState::Failed;
            OrchestrationError::MalformedPlan(message)
        };

        let Some(artifact) = artifact else {
            return Err(failed(graph, "planner produced no artifact".to_string()));
        };
        match serde_json::from_value::<TaskPlan>(artifact) {
            Ok(plan) if plan.tasks.is_empty() => {
                Err(failed(graph, "planner returned no tasks".to_string()))
            }
            Ok(plan) => Ok(plan),
            Err(error) => Err(failed(graph, error.to_string())),
        }
    }

    /// Materialize one worker node per planned task and merge `trip_info`
    /// into the travel context.
    fn expand(
        &mut self,
        plan: &TaskPlan,
        task_id: &str,
        context_id: &str,
    ) -> Result<(), OrchestrationError> {
        for (key, value) in &plan.trip_info {
            self.travel_context.insert(key.clone(), value.clone());
        }

        let planner_id = self.planner_node_id.ok_or_else(|| {
            OrchestrationError::Execution("no planner node in workflow".to_string())
        })?;

        if self.enable_parallel {
            // Groups fan out from the planner; tasks within a group share a
            // resource and stay chained.
            for (category, indices) in analyze_task_dependencies(&plan.tasks) {
                let mut parent = planner_id;
                for index in indices {
                    let task = &plan.tasks[index];
                    let id = self.add_graph_node(
                        task_id,
                        context_id,
                        &task.description,
                        Some(parent),
                        Some("worker"),
                        None,
                    )?;
                    tracing::debug!(node_id = %id, group = category.as_str(), "worker node added");
                    parent = id;
                }
            }
        } else {
            for task in &plan.tasks {
                self.add_graph_node(
                    task_id,
                    context_id,
                    &task.description,
                    Some(planner_id),
                    Some("worker"),
                    None,
                )?;
            }
        }

        tracing::info!(tasks = plan.tasks.len(), "workflow expanded from planner output");
        Ok(())
    }

    /// Pull artifacts of newly completed worker nodes into `results`.
    /// Runs only between levels / graph phases, never concurrently.
    fn harvest_results(&mut self) {
        let mut fresh = Vec::new();
        if let Some(graph) = &self.graph {
            for node in graph.nodes() {
                if node.is_planner()
                    || node.state != NodeState::Completed
                    || self.harvested.contains(&node.id)
                {
                    continue;
                }
                fresh.push((node.id, node.results.clone()));
            }
        }
        for (id, results) in fresh {
            self.harvested.insert(id);
            if let Some(value) = results {
                self.results.push(value);
            }
        }
    }

    /// Natural-language synthesis over the collected worker results.
    pub async fn generate_summary(&self) -> Result<String, OrchestrationError> {
        let results =
            serde_json::to_string_pretty(&self.results).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "You are a travel assistant. Write a concise, friendly summary of the \
             trip arrangements below for the traveler.\n\nData:\n{results}"
        );
        Ok(self.llm.generate(&prompt).await?)
    }

    /// Answer a follow-up question from accumulated context. The model
    /// decides whether the context suffices; no answer is fabricated.
    pub async fn answer_user_question(
        &self,
        question: &str,
    ) -> Result<UserAnswer, OrchestrationError> {
        let context = json!({
            "travel_context": self.travel_context,
            "query_history": self.query_history,
        });
        let prompt = format!(
            "Based strictly on the conversation context below, decide whether the \
             user's question can be answered. Respond with a JSON object \
             {{\"can_answer\": \"yes\"|\"no\", \"answer\": \"...\"}} and nothing else.\n\n\
             Context:\n{context}\n\nQuestion: {question}"
        );

        let text = self.llm.generate(&prompt).await?;
        Ok(serde_json::from_str(strip_code_fences(&text)).unwrap_or_else(|_| UserAnswer {
            can_answer: "no".to_string(),
            answer: "The available context does not answer this question.".to_string(),
        }))
    }
}

/// Models often wrap JSON replies in markdown fences.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|inner| inner.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
