// src/services/stock_detail.rs
use anyhow::{Context, Result};
use log::info;
use serde_json::{json, Value};

use crate::services::catalog::Catalog;
use crate::services::finnhub::{MarketDataProvider, Payload};

/// Live profile + quote for one ticker. Never touches the cache.
/// Both payloads are passed through as received, with `description` and
/// `name_zh` added to the profile.
pub async fn fetch_stock_detail(
    provider: &dyn MarketDataProvider,
    catalog: &Catalog,
    ticker: &str,
) -> Result<Value> {
    info!("Fetching live details for {}", ticker);

    let (profile, quote) = tokio::join!(provider.profile(ticker), provider.quote(ticker));
    let failed = || format!("Failed to fetch details for {}", ticker);
    let mut profile = profile.with_context(failed)?;
    let quote = quote.with_context(failed)?;

    let description = describe_company(&profile);
    let name_zh = catalog
        .localized_name(ticker)
        .filter(|name| !name.is_empty())
        .or_else(|| text_field(&profile, "name"))
        .map(|name| Value::String(name.to_string()))
        .unwrap_or(Value::Null);

    profile.insert("description".to_string(), Value::String(description));
    profile.insert("name_zh".to_string(), name_zh);

    Ok(json!({
        "profile": profile,
        "quote": quote,
    }))
}

/// Generated one-line company blurb. Missing, null, blank or non-string
/// fields read as unknown.
pub fn describe_company(profile: &Payload) -> String {
    format!(
        "(自动生成) {} 是一家总部位于 {} 的公司，属于 {} 行业，于 {} 上市。",
        text_field(profile, "name").unwrap_or("未知"),
        text_field(profile, "country").unwrap_or("未知"),
        text_field(profile, "finnhubIndustry").unwrap_or("未知"),
        text_field(profile, "ipo").unwrap_or("未知日期"),
    )
}

fn text_field<'a>(profile: &'a Payload, field: &str) -> Option<&'a str> {
    profile
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
