//! Tool gateway: the single surface the orchestrator and workflow nodes
//! speak to. The registry and data tools are never invoked directly.

use crate::{AgentDescriptor, CapabilityRegistry, PlacesClient, RegistryError, TravelStore};
use async_trait::async_trait;
use genai_client::TextEmbedder;
use serde_json::Value;
use std::sync::Arc;

pub const AGENT_CARDS_LIST_URI: &str = "resource://agent_cards/list";
pub const PLANNER_CARD_URI: &str = "resource://agent_cards/planner_agent";

/// Named tools and resources exposed to the workflow layer.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Nearest-neighbor capability lookup.
    async fn find_agent(&self, query: &str) -> Result<AgentDescriptor, RegistryError>;

    /// One read statement against the travel database.
    async fn query_data(&self, statement: &str) -> Result<Value, RegistryError>;

    /// Advisory places lookup; always succeeds, possibly empty.
    async fn query_places(&self, query: &str) -> Result<Value, RegistryError>;

    /// URIs of every indexed agent card.
    async fn list_agent_cards(&self) -> Result<Vec<String>, RegistryError>;

    /// Fetch one card by full `resource://agent_cards/<slug>` URI.
    async fn read_agent_card(&self, uri: &str) -> Result<AgentDescriptor, RegistryError>;

    /// Deterministic lookup of the planner's card.
    async fn planner_descriptor(&self) -> Result<AgentDescriptor, RegistryError> {
        self.read_agent_card(PLANNER_CARD_URI).await
    }
}

/// Gateway implementation bundling the registry and data tools.
pub struct ToolServer {
    registry: CapabilityRegistry,
    store: TravelStore,
    places: PlacesClient,
    embedder: Arc<dyn TextEmbedder>,
}

impl ToolServer {
    pub fn new(
        registry: CapabilityRegistry,
        store: TravelStore,
        places: PlacesClient,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            registry,
            store,
            places,
            embedder,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }
}

#[async_trait]
impl ToolGateway for ToolServer {
    async fn find_agent(&self, query: &str) -> Result<AgentDescriptor, RegistryError> {
        let row = self.registry.find(query, self.embedder.as_ref()).await?;
        Ok(row.descriptor.clone())
    }

    async fn query_data(&self, statement: &str) -> Result<Value, RegistryError> {
        self.store.query(statement).await
    }

    async fn query_places(&self, query: &str) -> Result<Value, RegistryError> {
        Ok(self.places.search(query).await)
    }

    async fn list_agent_cards(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.registry.uris())
    }

    async fn read_agent_card(&self, uri: &str) -> Result<AgentDescriptor, RegistryError> {
        Ok(self.registry.get(uri)?.descriptor.clone())
    }
}
