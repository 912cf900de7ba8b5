//! External Data Source Client
//!
//! Fetches the player snapshot from the SportsData.io HTTP API. One request,
//! one response, no pagination and no retry.

use crate::error::{LakeError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Header SportsData.io reads the subscription key from
pub const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// One player record as returned by the API. Fields are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn player_id(&self) -> Option<i64> {
        self.0.get("PlayerID").and_then(Value::as_i64)
    }

    pub fn first_name(&self) -> Option<&str> {
        self.0.get("FirstName").and_then(Value::as_str)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.0.get("LastName").and_then(Value::as_str)
    }

    pub fn team(&self) -> Option<&str> {
        self.0.get("Team").and_then(Value::as_str)
    }

    pub fn position(&self) -> Option<&str> {
        self.0.get("Position").and_then(Value::as_str)
    }

    pub fn points(&self) -> Option<i64> {
        self.0.get("Points").and_then(Value::as_i64)
    }
}

/// Anything that can hand the pipeline a finite batch of records
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Record>>;
}

/// HTTP client for the SportsData.io players endpoint
#[derive(Clone)]
pub struct SportsDataClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SportsDataClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let api_key = api_key.into();
        if endpoint.trim().is_empty() || api_key.trim().is_empty() {
            return Err(LakeError::Configuration(
                "endpoint and api key are required for the data source".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LakeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl RecordSource for SportsDataClient {
    async fn fetch(&self) -> Result<Vec<Record>> {
        info!("Fetching player data from {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| LakeError::Fetch {
                status: e.status().map(|s| s.as_u16()),
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Player endpoint returned {}", status);
            return Err(LakeError::Fetch {
                status: Some(status.as_u16()),
                message: if text.is_empty() {
                    status.to_string()
                } else {
                    text
                },
            });
        }

        let records: Vec<Record> = response.json().await.map_err(|e| LakeError::Fetch {
            status: None,
            message: format!("failed to decode response body: {}", e),
        })?;

        info!("Fetched {} player records", records.len());
        Ok(records)
    }
}
