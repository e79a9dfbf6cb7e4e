// src/services/config.rs
use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::warn;

use crate::services::refresh::RefreshSettings;

pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cache_backend: CacheBackend,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub cache_table: String,
    pub finnhub_api_key: Option<String>,
    pub finnhub_base_url: String,
    pub warmup_secret: Option<String>,
    pub catalog_path: String,
    pub refresh: RefreshSettings,
    pub warmup_cron: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("PORT must be a number, got {}", raw))?,
            None => {
                warn!("$PORT not set, defaulting to 3030");
                3030
            }
        };

        let cache_backend = match get("CACHE_BACKEND").as_deref() {
            None | Some("supabase") => CacheBackend::Supabase,
            Some("memory") => CacheBackend::Memory,
            Some(other) => bail!("Unknown CACHE_BACKEND '{}', expected 'supabase' or 'memory'", other),
        };

        let defaults = RefreshSettings::default();
        let batch_size = match get("REFRESH_BATCH_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("REFRESH_BATCH_SIZE must be a number, got {}", raw))?
                .max(1),
            None => defaults.batch_size,
        };
        let batch_delay = match get("REFRESH_BATCH_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("REFRESH_BATCH_DELAY_MS must be a number, got {}", raw))?,
            ),
            None => defaults.batch_delay,
        };

        let finnhub_api_key = get("FINNHUB_API_KEY");
        if finnhub_api_key.is_none() {
            warn!("FINNHUB_API_KEY not set, market data requests will fail");
        }
        let warmup_secret = get("WARMUP_SECRET");
        if warmup_secret.is_none() {
            warn!("WARMUP_SECRET not set, /api/warmup will reject every request");
        }

        Ok(Config {
            port,
            cache_backend,
            supabase_url: get("SUPABASE_URL"),
            supabase_key: get("SUPABASE_ANON_KEY"),
            cache_table: get("CACHE_TABLE").unwrap_or_else(|| "cache".to_string()),
            finnhub_api_key,
            finnhub_base_url: get("FINNHUB_BASE_URL").unwrap_or_else(|| DEFAULT_FINNHUB_BASE_URL.to_string()),
            warmup_secret,
            catalog_path: get("CATALOG_PATH").unwrap_or_else(|| "config/stock_catalog.json".to_string()),
            refresh: RefreshSettings { batch_size, batch_delay },
            warmup_cron: get("WARMUP_CRON"),
        })
    }
}
