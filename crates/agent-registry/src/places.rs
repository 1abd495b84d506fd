//! Places text-search lookup.
//!
//! Degrades to an empty result set when the API key is absent or the remote
//! call fails; place data is advisory, never load-bearing.

use reqwest::Client;
use serde_json::{json, Value};

const PLACES_SEARCH_URL: &str = "https://places.googleapis.com/v1/places:searchText";
const FIELD_MASK: &str = "places.displayName,places.formattedAddress,places.rating";

#[derive(Debug, Clone)]
pub struct PlacesClient {
    api_key: Option<String>,
    http: Client,
}

impl PlacesClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }

    /// Search places matching `query`, returning `{"places": [...]}`.
    pub async fn search(&self, query: &str) -> Value {
        let Some(api_key) = self.api_key.as_deref() else {
            return json!({ "places": [] });
        };

        match self.search_remote(api_key, query).await {
            Ok(places) => json!({ "places": places }),
            Err(error) => {
                tracing::warn!(query, %error, "places lookup failed");
                json!({ "places": [] })
            }
        }
    }

    async fn search_remote(&self, api_key: &str, query: &str) -> Result<Vec<Value>, reqwest::Error> {
        let response: Value = self
            .http
            .post(PLACES_SEARCH_URL)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&json!({ "textQuery": query }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let places = response
            .get("places")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|place| {
                        json!({
                            "name": place.pointer("/displayName/text").cloned().unwrap_or(Value::Null),
                            "address": place.get("formattedAddress").cloned().unwrap_or(Value::Null),
                            "rating": place.get("rating").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(places)
    }
}
