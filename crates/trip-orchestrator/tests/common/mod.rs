//! Shared stubs for orchestration integration tests: a scripted connector
//! standing in for remote agents, a routing gateway, and canned models.

#![allow(dead_code)]

use agent_registry::{AgentDescriptor, RegistryError, ToolGateway, PLANNER_CARD_URI};
use async_trait::async_trait;
use futures::StreamExt;
use genai_client::{GenAiError, LanguageModel};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use trip_orchestrator::{
    AgentConnector, NodeServices, TaskEvent, TaskEventStream, TaskMessage, TaskState,
    TransportError,
};

pub fn descriptor(name: &str, url: &str, description: &str) -> AgentDescriptor {
    AgentDescriptor {
        name: name.to_string(),
        url: url.to_string(),
        description: description.to_string(),
        capabilities: Vec::new(),
    }
}

/// Gateway routing discovery queries to fixed descriptors by keyword.
#[derive(Default)]
pub struct StubGateway {
    routes: Vec<(String, AgentDescriptor)>,
    planner: Option<AgentDescriptor>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_planner(mut self, planner: AgentDescriptor) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_route(mut self, keyword: &str, card: AgentDescriptor) -> Self {
        self.routes.push((keyword.to_lowercase(), card));
        self
    }
}

#[async_trait]
impl ToolGateway for StubGateway {
    async fn find_agent(&self, query: &str) -> Result<AgentDescriptor, RegistryError> {
        let lowered = query.to_lowercase();
        self.routes
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, card)| card.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("no agent for query {query:?}")))
    }

    async fn query_data(&self, _statement: &str) -> Result<Value, RegistryError> {
        Ok(json!({ "results": [] }))
    }

    async fn query_places(&self, _query: &str) -> Result<Value, RegistryError> {
        Ok(json!({ "places": [] }))
    }

    async fn list_agent_cards(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .planner
            .iter()
            .map(|_| PLANNER_CARD_URI.to_string())
            .collect())
    }

    async fn read_agent_card(&self, uri: &str) -> Result<AgentDescriptor, RegistryError> {
        if uri == PLANNER_CARD_URI {
            if let Some(planner) = &self.planner {
                return Ok(planner.clone());
            }
        }
        Err(RegistryError::NotFound(format!("agent card {uri}")))
    }
}

/// One scripted streaming session.
pub enum Script {
    Events {
        events: Vec<TaskEvent>,
        delay: Option<Duration>,
    },
    EventsThenError {
        events: Vec<TaskEvent>,
        message: String,
    },
    ConnectError(String),
}

impl Script {
    fn into_stream(self) -> Result<TaskEventStream, TransportError> {
        match self {
            Script::Events { events, delay } => Ok(futures::stream::iter(events)
                .then(move |event| async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(event)
                })
                .boxed()),
            Script::EventsThenError { events, message } => {
                let ok = futures::stream::iter(events.into_iter().map(Ok));
                let err = futures::stream::once(async move {
                    Err(TransportError::Stream(message))
                });
                Ok(ok.chain(err).boxed())
            }
            Script::ConnectError(message) => Err(TransportError::Stream(message)),
        }
    }
}

/// Connector replaying scripted sessions per agent URL, in order.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, url: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(script);
        self
    }
}

#[async_trait]
impl AgentConnector for ScriptedConnector {
    async fn open_stream(
        &self,
        descriptor: &AgentDescriptor,
        _message: TaskMessage,
    ) -> Result<TaskEventStream, TransportError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&descriptor.url)
            .and_then(VecDeque::pop_front);
        match script {
            Some(script) => script.into_stream(),
            None => Err(TransportError::Connect {
                url: descriptor.url.clone(),
                message: "no scripted session".to_string(),
            }),
        }
    }
}

/// Language model returning queued replies, then a fixed default.
pub struct CannedLlm {
    replies: Mutex<VecDeque<String>>,
    default: String,
}

impl CannedLlm {
    pub fn new(default: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default: default.to_string(),
        }
    }

    pub fn with_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(reply.to_string());
        self
    }
}

#[async_trait]
impl LanguageModel for CannedLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, GenAiError> {
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Language model with no backing service.
pub struct FailingLlm;

#[async_trait]
impl LanguageModel for FailingLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, GenAiError> {
        Err(GenAiError::MissingApiKey)
    }
}

pub fn services(gateway: StubGateway, connector: ScriptedConnector) -> NodeServices {
    NodeServices {
        gateway: std::sync::Arc::new(gateway),
        connector: std::sync::Arc::new(connector),
    }
}

pub fn working() -> TaskEvent {
    TaskEvent::Status {
        state: TaskState::Working,
        message: Some("working".to_string()),
        last: false,
    }
}

pub fn completed() -> TaskEvent {
    TaskEvent::Status {
        state: TaskState::Completed,
        message: None,
        last: true,
    }
}

pub fn input_required(message: &str) -> TaskEvent {
    TaskEvent::Status {
        state: TaskState::InputRequired,
        message: Some(message.to_string()),
        last: true,
    }
}

pub fn failed(message: &str) -> TaskEvent {
    TaskEvent::Status {
        state: TaskState::Failed,
        message: Some(message.to_string()),
        last: true,
    }
}

pub fn artifact(name: &str, data: Value) -> TaskEvent {
    TaskEvent::Artifact {
        name: name.to_string(),
        data,
    }
}

/// A worker session that streams a result artifact and completes.
pub fn worker_script(data: Value) -> Script {
    Script::Events {
        events: vec![working(), artifact("result", data), completed()],
        delay: None,
    }
}

/// A planner session producing a structured task plan.
pub fn planner_script(plan: Value) -> Script {
    Script::Events {
        events: vec![working(), artifact("PlannerAgent-result", plan), completed()],
        delay: None,
    }
}

/// The standard three-task London plan used across tests.
pub fn london_plan() -> Value {
    json!({
        "trip_info": {
            "destination": "London",
            "origin": "San Francisco",
            "duration": "6 days"
        },
        "tasks": [
            { "description": "Find flights from SFO to LHR" },
            { "description": "Book hotel in London" },
            { "description": "Rent a car in London" }
        ]
    })
}
