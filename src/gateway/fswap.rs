//! 4swap HTTP client
//!
//! Reads the public asset catalog and the MTG routing group.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::directory::CatalogAsset;
use crate::error::SwapBotError;
use crate::gateway::GroupSource;
use crate::models::SwapGroup;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_BASE_URL: &str = "https://mtgswap-api.fox.one";

/// Reusable swap service client (connection-pooled)
#[derive(Clone)]
pub struct FswapClient {
    client: Client,
    base_url: String,
}

impl FswapClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Supported assets. Failure here is fatal to start-up.
    pub async fn read_assets(&self) -> Result<Vec<CatalogAsset>> {
        let data: AssetsData = self
            .get_data("/api/assets")
            .await
            .map_err(|e| SwapBotError::Catalog(e.to_string()))?;

        info!(count = data.assets.len(), "Asset catalog fetched");
        Ok(data.assets)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Swap service request failed for {}: {}", path, e);
            SwapBotError::TransportFailure(format!("{}: {}", path, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwapBotError::TransportFailure(format!(
                "swap service returned {} for {}: {}",
                status, path, body
            )));
        }

        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl GroupSource for FswapClient {
    async fn read_group(&self) -> Result<SwapGroup> {
        let group: SwapGroup = self.get_data("/api/info").await?;
        info!(
            members = group.members.len(),
            threshold = group.threshold,
            "Swap group fetched"
        );
        Ok(group)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AssetsData {
    #[serde(default)]
    assets: Vec<CatalogAsset>,
}
