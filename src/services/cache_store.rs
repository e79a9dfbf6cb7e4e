// src/services/cache_store.rs
use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

/// Key-value table of JSON payloads with upsert-by-key writes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn upsert(&self, key: &str, value: Value) -> Result<()>;
}

#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
}

/// Cache table behind Supabase's PostgREST endpoint.
pub struct SupabaseStore {
    pub config: SupabaseConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CacheRow {
    value: Value,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Self {
        SupabaseStore {
            config,
            client: Client::new(),
        }
    }

    /// Fails when either credential is missing, so a misconfigured deploy stops at startup.
    pub fn from_credentials(url: Option<&str>, api_key: Option<&str>, table: &str) -> Result<Self> {
        let url = url.ok_or_else(|| anyhow!("SUPABASE_URL is not configured."))?;
        let api_key = api_key.ok_or_else(|| anyhow!("SUPABASE_ANON_KEY is not configured."))?;
        Ok(Self::new(SupabaseConfig {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        }))
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, self.config.table)
    }
}

#[async_trait]
impl CacheStore for SupabaseStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key_filter = format!("eq.{}", key);
        let rows: Vec<CacheRow> = self.client
            .get(self.table_url())
            .query(&[("select", "value"), ("key", key_filter.as_str())])
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .with_context(|| format!("Cache lookup request failed for key {}", key))?
            .error_for_status()
            .with_context(|| format!("Cache lookup rejected for key {}", key))?
            .json()
            .await
            .with_context(|| format!("Malformed cache row for key {}", key))?;

        debug!("Cache lookup for {} returned {} row(s)", key, rows.len());
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    async fn upsert(&self, key: &str, value: Value) -> Result<()> {
        let body = json!([{ "key": key, "value": value }]);

        self.client
            .post(self.table_url())
            .query(&[("on_conflict", "key")])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Cache upsert request failed for key {}", key))?
            .error_for_status()
            .with_context(|| format!("Cache upsert rejected for key {}", key))?;

        info!("Upserted cache entry {}", key);
        Ok(())
    }
}

/// In-process cache table for local runs without Supabase.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
