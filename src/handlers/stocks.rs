// src/handlers/stocks.rs
use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};
use warp::reply::Response;
use warp::{Rejection, Reply};

use super::error::ApiError;
use super::AppContext;
use crate::services::catalog::{sector_cache_key, HOMEPAGE_KEY};
use crate::services::stock_detail::fetch_stock_detail;

const CACHE_CONTROL: &str = "public, s-maxage=60, stale-while-revalidate=300";
const CACHE_MISS_MESSAGE: &str = "Cache entry does not exist or is still being generated. Run /api/warmup first.";

/// `GET /api/stocks`: live detail for `?ticker=`, otherwise a cached list.
pub async fn get_stocks(
    query: HashMap<String, String>,
    ctx: Arc<AppContext>,
) -> Result<Response, Rejection> {
    if let Some(ticker) = query.get("ticker").map(|t| t.trim()).filter(|t| !t.is_empty()) {
        return get_stock_detail(ticker, &ctx).await;
    }

    let cache_key = match query.get("sector").filter(|s| !s.is_empty()) {
        Some(sector) => sector_cache_key(sector),
        None => HOMEPAGE_KEY.to_string(),
    };
    get_cached_list(&cache_key, &ctx).await
}

async fn get_stock_detail(ticker: &str, ctx: &AppContext) -> Result<Response, Rejection> {
    match fetch_stock_detail(ctx.provider.as_ref(), &ctx.catalog, ticker).await {
        Ok(detail) => Ok(warp::reply::json(&detail).into_response()),
        Err(e) => {
            error!("Failed to fetch details for {}: {:#}", ticker, e);
            Err(warp::reject::custom(ApiError::external_error(format!("{:#}", e))))
        }
    }
}

async fn get_cached_list(cache_key: &str, ctx: &AppContext) -> Result<Response, Rejection> {
    let cached = match ctx.store.get(cache_key).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            info!("Cache MISS for key {}", cache_key);
            return Err(warp::reject::custom(ApiError::cache_miss(CACHE_MISS_MESSAGE)));
        }
        Err(e) => {
            error!("Cache lookup failed for key {}: {:#}", cache_key, e);
            return Err(warp::reject::custom(ApiError::cache_miss(CACHE_MISS_MESSAGE)));
        }
    };

    Ok(warp::reply::with_header(warp::reply::json(&cached), "Cache-Control", CACHE_CONTROL).into_response())
}
