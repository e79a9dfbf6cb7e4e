// src/services/finnhub.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{Map, Value};

/// Raw JSON object exactly as the provider sent it.
pub type Payload = Map<String, Value>;

/// Two-endpoint market data source: quote and company profile per ticker.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quote(&self, ticker: &str) -> Result<Payload>;
    async fn profile(&self, ticker: &str) -> Result<Payload>;
}

pub struct FinnhubClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FinnhubClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        FinnhubClient {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FINNHUB_API_KEY is not configured."))
    }

    async fn get_json(&self, path: &str, ticker: &str) -> Result<Payload> {
        let token = self.api_key()?;
        let url = format!("{}/{}", self.base_url, path);
        debug!("Fetching {} for {}", url, ticker);

        let response = self.client
            .get(&url)
            .query(&[("symbol", ticker), ("token", token)])
            .send()
            .await
            .with_context(|| format!("Request to {} failed for {}", path, ticker))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {} for {}", path, status, ticker));
        }

        response
            .json::<Payload>()
            .await
            .with_context(|| format!("Malformed {} payload for {}", path, ticker))
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubClient {
    async fn quote(&self, ticker: &str) -> Result<Payload> {
        self.get_json("quote", ticker).await
    }

    async fn profile(&self, ticker: &str) -> Result<Payload> {
        self.get_json("stock/profile2", ticker).await
    }
}
