// src/app.rs
use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::handlers::AppContext;
use crate::services::cache_store::{CacheStore, MemoryStore, SupabaseStore};
use crate::services::catalog::Catalog;
use crate::services::config::{CacheBackend, Config};
use crate::services::finnhub::{FinnhubClient, MarketDataProvider};
use crate::services::refresh::RefreshPipeline;

/// Constructs every client once from config and wires them together.
pub fn build_context(config: &Config) -> Result<Arc<AppContext>> {
    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);

    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Supabase => Arc::new(SupabaseStore::from_credentials(
            config.supabase_url.as_deref(),
            config.supabase_key.as_deref(),
            &config.cache_table,
        )?),
        CacheBackend::Memory => {
            info!("Using in-memory cache store; entries are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let provider: Arc<dyn MarketDataProvider> = Arc::new(FinnhubClient::new(
        config.finnhub_base_url.clone(),
        config.finnhub_api_key.clone(),
    ));

    let pipeline = Arc::new(RefreshPipeline::new(
        provider.clone(),
        store.clone(),
        catalog.clone(),
        config.refresh,
    ));

    Ok(Arc::new(AppContext {
        provider,
        store,
        catalog,
        pipeline,
        warmup_secret: config.warmup_secret.clone(),
    }))
}
