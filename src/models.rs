// src/models.rs
use serde::{Serialize, Deserialize};

/// One ticker as listed in the static catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_zh: Option<String>,
}

impl TickerEntry {
    pub fn new(ticker: impl Into<String>) -> Self {
        TickerEntry {
            ticker: ticker.into(),
            name_zh: None,
        }
    }
}

/// The part of a quote the refresh pipeline reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub dp: Option<f64>,
}

/// The part of a company profile the refresh pipeline reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyProfile {
    #[serde(rename = "marketCapitalization", default)]
    pub market_capitalization: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-ticker result of a successful fetch, before sector reclassification.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSeed {
    pub ticker: String,
    pub market_cap: f64,
    pub change_percent: f64,
    pub name_zh: String,
}

/// Display-ready record stored as part of a cached list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    pub market_cap: f64,
    pub change_percent: f64,
    pub name_zh: String,
    pub sector: String,
    pub original_sector: String,
}
