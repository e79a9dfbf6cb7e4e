// src/services/catalog.rs
use std::collections::HashMap;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::models::TickerEntry;

/// Cache key of the cross-sector sample list.
pub const HOMEPAGE_KEY: &str = "homepage";
/// Sector assigned to tickers that no catalog sector lists.
pub const OTHER_SECTOR: &str = "Other";
/// Number of leading tickers each sector contributes to the homepage list.
pub const HOMEPAGE_PER_SECTOR: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct SectorList {
    pub key: String,
    pub tickers: Vec<TickerEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    sectors: Vec<SectorList>,
    #[serde(default)]
    sector_labels: HashMap<String, String>,
    #[serde(default)]
    names: HashMap<String, String>,
}

/// Read-only catalog of tickers grouped by sector, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    sectors: Vec<SectorList>,
    sector_labels: HashMap<String, String>,
    names: HashMap<String, String>,
    sector_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(
        sectors: Vec<SectorList>,
        sector_labels: HashMap<String, String>,
        extra_names: HashMap<String, String>,
    ) -> Self {
        let mut names = HashMap::new();
        let mut sector_index = HashMap::new();

        for (idx, sector) in sectors.iter().enumerate() {
            for entry in &sector.tickers {
                // first sector listing a ticker owns it
                sector_index.entry(entry.ticker.clone()).or_insert(idx);
                if let Some(name) = &entry.name_zh {
                    names.entry(entry.ticker.clone()).or_insert_with(|| name.clone());
                }
            }
        }
        names.extend(extra_names);

        Catalog {
            sectors,
            sector_labels,
            names,
            sector_index,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw).context("Invalid stock catalog JSON")?;
        Ok(Self::new(file.sectors, file.sector_labels, file.names))
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stock catalog at {}", path))?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            "Loaded stock catalog from {}: {} sectors, {} tickers",
            path,
            catalog.sectors.len(),
            catalog.sector_index.len()
        );
        Ok(catalog)
    }

    /// Sectors in catalog order.
    pub fn sectors(&self) -> &[SectorList] {
        &self.sectors
    }

    /// Catalog key of the sector owning `ticker`, or [`OTHER_SECTOR`].
    pub fn sector_of(&self, ticker: &str) -> &str {
        self.sector_index
            .get(ticker)
            .and_then(|idx| self.sectors.get(*idx))
            .map(|sector| sector.key.as_str())
            .unwrap_or(OTHER_SECTOR)
    }

    /// Display label for a sector key, falling back to the key itself.
    pub fn display_label<'a>(&'a self, sector_key: &'a str) -> &'a str {
        self.sector_labels
            .get(sector_key)
            .map(String::as_str)
            .unwrap_or(sector_key)
    }

    pub fn localized_name(&self, ticker: &str) -> Option<&str> {
        self.names.get(ticker).map(String::as_str)
    }

    /// The first [`HOMEPAGE_PER_SECTOR`] entries of every sector, in catalog order.
    pub fn homepage_entries(&self) -> Vec<TickerEntry> {
        self.sectors
            .iter()
            .flat_map(|sector| sector.tickers.iter().take(HOMEPAGE_PER_SECTOR).cloned())
            .collect()
    }
}

/// Cache key for a sector name. Warmup and reads both go through here.
pub fn sector_cache_key(sector_name: &str) -> String {
    let safe: String = sector_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("sector_{}", safe)
}
