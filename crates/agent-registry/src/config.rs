//! Environment-driven configuration for the registry and data tools.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory scanned (non-recursively) for agent card files.
    pub agent_cards_dir: PathBuf,
    /// SQLite database backing the travel data tool.
    pub travel_db: PathBuf,
    /// Places lookups degrade to empty results when this is absent.
    pub places_api_key: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            agent_cards_dir: PathBuf::from("agent_cards"),
            travel_db: PathBuf::from("travel_agency.db"),
            places_api_key: None,
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            agent_cards_dir: env::var("AGENT_CARDS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.agent_cards_dir),
            travel_db: env::var("TRAVEL_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.travel_db),
            places_api_key: env::var("GOOGLE_PLACES_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}
