//! Capability discovery and data tools for the travel fleet.
//!
//! This crate owns the agent-card registry (semantic nearest-neighbor lookup
//! over descriptor embeddings), the read-only travel data tool, the places
//! lookup, and the `ToolGateway` surface the orchestrator speaks to.

pub mod config;
pub mod descriptor;
pub mod gateway;
pub mod places;
pub mod registry;
pub mod travel_data;

pub use config::RegistryConfig;
pub use descriptor::AgentDescriptor;
pub use gateway::{ToolGateway, ToolServer, AGENT_CARDS_LIST_URI, PLANNER_CARD_URI};
pub use places::PlacesClient;
pub use registry::{CapabilityRegistry, DescriptorRow};
pub use travel_data::TravelStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] genai_client::GenAiError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}
