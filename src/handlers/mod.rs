// src/handlers/mod.rs
use std::sync::Arc;

use crate::services::cache_store::CacheStore;
use crate::services::catalog::Catalog;
use crate::services::finnhub::MarketDataProvider;
use crate::services::refresh::RefreshPipeline;

pub mod error;
pub mod stocks;
pub mod warmup;

/// Shared clients handed to every request handler.
pub struct AppContext {
    pub provider: Arc<dyn MarketDataProvider>,
    pub store: Arc<dyn CacheStore>,
    pub catalog: Arc<Catalog>,
    pub pipeline: Arc<RefreshPipeline>,
    pub warmup_secret: Option<String>,
}
