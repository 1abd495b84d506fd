//! Mutable workflow DAG: structural operations, attribute storage,
//! deterministic topological execution and parallel-by-level execution.
//!
//! The graph has a single writer (the orchestrator); executing nodes mutate
//! only their own state and results.

use crate::events::WorkflowChunk;
use crate::node::{NodeAttributes, NodeOutcome, NodeServices, NodeState, WorkflowNode};
use crate::OrchestrationError;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Initialized,
    Running,
    Paused,
    Completed,
    Failed,
}

/// How a call to one of the executors stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowRunOutcome {
    Completed,
    Paused { node_id: Uuid },
}

pub struct WorkflowGraph {
    graph: DiGraph<Uuid, ()>,
    indices: HashMap<Uuid, NodeIndex>,
    nodes: HashMap<Uuid, WorkflowNode>,
    attributes: HashMap<Uuid, NodeAttributes>,
    insertion_order: Vec<Uuid>,
    pub state: WorkflowState,
    /// Insertion-order cursor for convenience appends.
    pub latest_node: Option<Uuid>,
    pub paused_node_id: Option<Uuid>,
    /// Levels with at least this many siblings run in parallel. Changing it
    /// is safe only between runs.
    pub parallel_threshold: usize,
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
            nodes: HashMap::new(),
            attributes: HashMap::new(),
            insertion_order: Vec::new(),
            state: WorkflowState::Initialized,
            latest_node: None,
            paused_node_id: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_threshold(parallel_threshold: usize) -> Self {
        Self {
            parallel_threshold,
            ..Self::new()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Insert a node into the node map and the graph; updates `latest_node`.
    pub fn add_node(&mut self, node: WorkflowNode) -> Uuid {
        let id = node.id;
        let index = self.graph.add_node(id);
        self.indices.insert(id, index);
        self.nodes.insert(id, node);
        self.insertion_order.push(id);
        self.latest_node = Some(id);
        id
    }

    /// Add a directed edge; both endpoints must already exist.
    pub fn add_edge(&mut self, from: Uuid, to: Uuid) -> Result<(), OrchestrationError> {
        let (Some(&from_index), Some(&to_index)) =
            (self.indices.get(&from), self.indices.get(&to))
        else {
            return Err(OrchestrationError::InvalidNodeIds);
        };

        let edge = self.graph.add_edge(from_index, to_index, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(OrchestrationError::CycleDetected);
        }
        Ok(())
    }

    pub fn node(&self, id: Uuid) -> Option<&WorkflowNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    pub fn set_node_attributes(
        &mut self,
        id: Uuid,
        attributes: NodeAttributes,
    ) -> Result<(), OrchestrationError> {
        if !self.nodes.contains_key(&id) {
            return Err(OrchestrationError::UnknownNode(id));
        }
        self.attributes.insert(id, attributes);
        Ok(())
    }

    pub fn attributes(&self, id: Uuid) -> Option<&NodeAttributes> {
        self.attributes.get(&id)
    }

    /// Replace a node's query, e.g. to feed new input into a paused node.
    pub fn set_node_query(&mut self, id: Uuid, query: impl Into<String>) -> Result<(), OrchestrationError> {
        if !self.nodes.contains_key(&id) {
            return Err(OrchestrationError::UnknownNode(id));
        }
        self.attributes.entry(id).or_default().query = query.into();
        Ok(())
    }

    pub fn predecessors(&self, id: Uuid) -> Vec<Uuid> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn successors(&self, id: Uuid) -> Vec<Uuid> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: Uuid, direction: Direction) -> Vec<Uuid> {
        let Some(&index) = self.indices.get(&id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<Uuid> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbor| self.graph[neighbor])
            .collect();
        neighbors.sort_by_key(|n| self.insertion_position(*n));
        neighbors
    }

    fn insertion_position(&self, id: Uuid) -> usize {
        self.insertion_order
            .iter()
            .position(|&n| n == id)
            .unwrap_or(usize::MAX)
    }

    /// First root in insertion order, falling back to the first node.
    fn default_start(&self) -> Option<Uuid> {
        self.insertion_order
            .iter()
            .copied()
            .find(|&id| self.predecessors(id).is_empty())
            .or_else(|| self.insertion_order.first().copied())
    }

    fn reachable_from(&self, start: Uuid) -> HashSet<Uuid> {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if reachable.insert(id) {
                queue.extend(self.successors(id));
            }
        }
        reachable
    }

    /// Deterministic topological order over the nodes reachable from `start`:
    /// ready nodes are emitted in insertion order.
    fn topological_order(&self, start: Uuid) -> Vec<Uuid> {
        let reachable = self.reachable_from(start);
        let mut indegree: HashMap<Uuid, usize> = reachable
            .iter()
            .map(|&id| {
                let count = self
                    .predecessors(id)
                    .iter()
                    .filter(|p| reachable.contains(p))
                    .count();
                (id, count)
            })
            .collect();

        let mut order = Vec::with_capacity(reachable.len());
        let mut emitted = HashSet::new();
        loop {
            let mut progressed = false;
            for &id in &self.insertion_order {
                if !reachable.contains(&id) || emitted.contains(&id) {
                    continue;
                }
                if indegree.get(&id).copied().unwrap_or(0) > 0 {
                    continue;
                }
                emitted.insert(id);
                order.push(id);
                progressed = true;
                for successor in self.successors(id) {
                    if let Some(count) = indegree.get_mut(&successor) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        order
    }

    /// Partition reachable nodes by longest-path depth from `start`.
    ///
    /// Nodes within a level have no dependency between them; for every edge
    /// `(u, v)`, the level of `v` is strictly greater than the level of `u`.
    pub fn get_execution_levels(&self, start: Uuid) -> Vec<Vec<Uuid>> {
        let order = self.topological_order(start);
        let reachable: HashSet<Uuid> = order.iter().copied().collect();

        let mut depth: HashMap<Uuid, usize> = HashMap::new();
        for &id in &order {
            let level = self
                .predecessors(id)
                .iter()
                .filter(|p| reachable.contains(p))
                .filter_map(|p| depth.get(p).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(id, level);
        }

        let level_count = depth.values().max().map(|d| d + 1).unwrap_or(0);
        let mut levels = vec![Vec::new(); level_count];
        for &id in &order {
            levels[depth[&id]].push(id);
        }
        levels
    }

    /// Levels eligible for concurrent execution under the current threshold.
    pub fn identify_parallel_tasks(&self) -> Vec<Vec<Uuid>> {
        let Some(start) = self.default_start() else {
            return Vec::new();
        };
        self.get_execution_levels(start)
            .into_iter()
            .filter(|level| level.len() >= self.parallel_threshold)
            .collect()
    }

    /// Textual execution plan, one line per level.
    pub fn visualize_execution_plan(&self) -> String {
        let mut plan = String::from("Execution Plan:\n");
        let Some(start) = self.default_start() else {
            return plan;
        };
        for (index, level) in self.get_execution_levels(start).iter().enumerate() {
            let mode = if level.len() >= self.parallel_threshold {
                "PARALLEL"
            } else {
                "SEQUENTIAL"
            };
            let labels: Vec<&str> = level
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|node| node.label())
                .collect();
            plan.push_str(&format!("Level {index} ({mode}): {}\n", labels.join(", ")));
        }
        plan
    }

    /// Execute reachable nodes in deterministic topological order, relaying
    /// every chunk into `sink`.
    ///
    /// Already-completed nodes are skipped, which lets the orchestrator
    /// expand the graph between calls and resume where it left off. Pausing
    /// records `paused_node_id`; a node failure marks the graph failed and
    /// propagates.
    pub async fn run_workflow(
        &mut self,
        services: &NodeServices,
        start_node_id: Option<Uuid>,
        sink: &mpsc::Sender<WorkflowChunk>,
    ) -> Result<WorkflowRunOutcome, OrchestrationError> {
        let Some(start) = start_node_id.or_else(|| self.default_start()) else {
            return Ok(WorkflowRunOutcome::Completed);
        };
        if !self.nodes.contains_key(&start) {
            return Err(OrchestrationError::UnknownNode(start));
        }

        self.state = WorkflowState::Running;
        self.paused_node_id = None;

        for id in self.topological_order(start) {
            let attrs = self.attributes.get(&id).cloned().unwrap_or_default();
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            if node.state == NodeState::Completed {
                continue;
            }

            match node.run(services, &attrs, sink).await {
                Ok(NodeOutcome::Completed) => {}
                Ok(NodeOutcome::Paused) => {
                    self.state = WorkflowState::Paused;
                    self.paused_node_id = Some(id);
                    tracing::info!(node_id = %id, "workflow paused awaiting input");
                    return Ok(WorkflowRunOutcome::Paused { node_id: id });
                }
                Err(error) => {
                    self.state = WorkflowState::Failed;
                    tracing::warn!(node_id = %id, %error, "workflow failed");
                    return Err(error);
                }
            }
        }

        self.state = WorkflowState::Completed;
        Ok(WorkflowRunOutcome::Completed)
    }

    /// Execute reachable nodes level by level; levels meeting the parallel
    /// threshold fan out, smaller levels run sequentially.
    ///
    /// Unlike sequential execution, a node failure pauses that node for
    /// recovery instead of failing the graph, and execution stops at the
    /// next level boundary.
    pub async fn run_workflow_levels(
        &mut self,
        services: &NodeServices,
        start_node_id: Option<Uuid>,
        sink: &mpsc::Sender<WorkflowChunk>,
    ) -> Result<WorkflowRunOutcome, OrchestrationError> {
        let Some(start) = start_node_id.or_else(|| self.default_start()) else {
            return Ok(WorkflowRunOutcome::Completed);
        };
        if !self.nodes.contains_key(&start) {
            return Err(OrchestrationError::UnknownNode(start));
        }

        self.state = WorkflowState::Running;
        self.paused_node_id = None;

        for level in self.get_execution_levels(start) {
            let pending: Vec<Uuid> = level
                .iter()
                .copied()
                .filter(|id| {
                    self.nodes
                        .get(id)
                        .map(|node| node.state != NodeState::Completed)
                        .unwrap_or(false)
                })
                .collect();
            if pending.is_empty() {
                continue;
            }

            if pending.len() >= self.parallel_threshold {
                tracing::info!(nodes = pending.len(), "executing level in parallel");
                self.execute_parallel_level(&pending, services, sink).await?;
            } else {
                for id in &pending {
                    let attrs = self.attributes.get(id).cloned().unwrap_or_default();
                    let Some(node) = self.nodes.get_mut(id) else {
                        continue;
                    };
                    if let Err(error) = node.run(services, &attrs, sink).await {
                        tracing::warn!(node_id = %id, %error, "node failed, pausing for recovery");
                        node.state = NodeState::Paused;
                    }
                }
            }

            // Recovery decisions happen at level boundaries.
            if let Some(paused) = pending.iter().copied().find(|id| {
                self.nodes
                    .get(id)
                    .map(|node| node.state == NodeState::Paused)
                    .unwrap_or(false)
            }) {
                self.state = WorkflowState::Paused;
                self.paused_node_id = Some(paused);
                return Ok(WorkflowRunOutcome::Paused { node_id: paused });
            }
        }

        self.state = WorkflowState::Completed;
        self.paused_node_id = None;
        Ok(WorkflowRunOutcome::Completed)
    }

    /// Run one level concurrently: one task per node, chunks interleaved
    /// into the shared sink as they arrive, waiting for all to finish.
    ///
    /// A failing node ends paused and does not cancel its siblings. A level
    /// with a single node degrades to sequential execution.
    pub async fn execute_parallel_level(
        &mut self,
        ids: &[Uuid],
        services: &NodeServices,
        sink: &mpsc::Sender<WorkflowChunk>,
    ) -> Result<Vec<(Uuid, Vec<WorkflowChunk>)>, OrchestrationError> {
        for id in ids {
            if !self.nodes.contains_key(id) {
                return Err(OrchestrationError::UnknownNode(*id));
            }
        }

        let mut collected = Vec::with_capacity(ids.len());

        if ids.len() < 2 {
            for id in ids {
                let attrs = self.attributes.get(id).cloned().unwrap_or_default();
                let Some(node) = self.nodes.get_mut(id) else {
                    continue;
                };
                match node.run_with_result(services, &attrs, sink.clone()).await {
                    Ok(pair) => collected.push(pair),
                    Err(error) => {
                        tracing::warn!(node_id = %id, %error, "node failed, pausing for recovery");
                        node.state = NodeState::Paused;
                    }
                }
            }
        } else {
            let mut handles = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(mut node) = self.nodes.remove(id) else {
                    continue;
                };
                let attrs = self.attributes.get(id).cloned().unwrap_or_default();
                let services = services.clone();
                let shared = sink.clone();
                handles.push(tokio::spawn(async move {
                    let result = node.run_with_result(&services, &attrs, shared).await;
                    (node, result)
                }));
            }

            for handle in handles {
                let (mut node, result) = handle
                    .await
                    .map_err(|error| OrchestrationError::Execution(error.to_string()))?;
                let id = node.id;
                match result {
                    Ok(pair) => collected.push(pair),
                    Err(error) => {
                        tracing::warn!(node_id = %id, %error, "node failed in parallel level, pausing for recovery");
                        node.state = NodeState::Paused;
                    }
                }
                self.nodes.insert(id, node);
            }
        }

        if let Some(paused) = ids.iter().copied().find(|id| {
            self.nodes
                .get(id)
                .map(|node| node.state == NodeState::Paused)
                .unwrap_or(false)
        }) {
            self.state = WorkflowState::Paused;
            self.paused_node_id = Some(paused);
        }

        Ok(collected)
    }
}
