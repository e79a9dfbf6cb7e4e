// src/services/refresh.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::{CompanyProfile, Quote, StockRecord, StockSeed, TickerEntry};
use crate::services::cache_store::CacheStore;
use crate::services::catalog::{sector_cache_key, Catalog, HOMEPAGE_KEY};
use crate::services::finnhub::{MarketDataProvider, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub batch_size: usize,
    /// Pause between consecutive batches; a fixed throttle for the provider's rate limit.
    pub batch_delay: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            batch_size: 20,
            batch_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub key: String,
    pub requested: usize,
    pub fetched: usize,
    pub batches: usize,
    pub stored: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmupReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub refreshed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub struct RefreshPipeline {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn CacheStore>,
    catalog: Arc<Catalog>,
    settings: RefreshSettings,
}

impl RefreshPipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn CacheStore>,
        catalog: Arc<Catalog>,
        settings: RefreshSettings,
    ) -> Self {
        RefreshPipeline {
            provider,
            store,
            catalog,
            settings,
        }
    }

    /// Fetches quote and profile for one ticker. Any failure yields `None`
    /// so a single bad ticker never aborts its batch.
    pub async fn fetch_ticker(&self, ticker: &str) -> Option<StockSeed> {
        let (quote, profile) = tokio::join!(self.provider.quote(ticker), self.provider.profile(ticker));

        let quote = match quote.and_then(parse_payload::<Quote>) {
            Ok(quote) => quote,
            Err(e) => {
                debug!("Dropping {}: quote fetch failed: {:#}", ticker, e);
                return None;
            }
        };
        let profile = match profile.and_then(parse_payload::<CompanyProfile>) {
            Ok(profile) => profile,
            Err(e) => {
                debug!("Dropping {}: profile fetch failed: {:#}", ticker, e);
                return None;
            }
        };

        // zero or missing market cap marks an unlisted symbol
        let Some(market_cap) = profile
            .market_capitalization
            .filter(|cap| cap.is_finite() && *cap != 0.0)
        else {
            debug!("Dropping {}: no usable market capitalization", ticker);
            return None;
        };
        let Some(change_percent) = quote.dp else {
            debug!("Dropping {}: quote has no percent change", ticker);
            return None;
        };

        Some(StockSeed {
            ticker: ticker.to_string(),
            market_cap,
            change_percent,
            name_zh: profile
                .name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| ticker.to_string()),
        })
    }

    /// Fetches `tickers` in fixed-size batches, pausing between batches.
    /// Returns the successful seeds in input order and the number of batches run.
    async fn fetch_in_batches(&self, tickers: &[String]) -> (Vec<StockSeed>, usize) {
        let batch_size = self.settings.batch_size.max(1);
        let batch_count = tickers.len().div_ceil(batch_size);
        let mut fetched = Vec::with_capacity(tickers.len());

        for (idx, batch) in tickers.chunks(batch_size).enumerate() {
            let results = join_all(batch.iter().map(|ticker| self.fetch_ticker(ticker))).await;
            fetched.extend(results.into_iter().flatten());

            if idx + 1 < batch_count {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        (fetched, batch_count)
    }

    /// Attaches sector, display label and localized name to fetched seeds.
    pub fn reclassify(&self, seeds: Vec<StockSeed>) -> Vec<StockRecord> {
        seeds
            .into_iter()
            .map(|seed| {
                let original_sector = self.catalog.sector_of(&seed.ticker).to_string();
                let sector = self.catalog.display_label(&original_sector).to_string();
                let name_zh = self
                    .catalog
                    .localized_name(&seed.ticker)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or(seed.name_zh);
                StockRecord {
                    ticker: seed.ticker,
                    market_cap: seed.market_cap,
                    change_percent: seed.change_percent,
                    name_zh,
                    sector,
                    original_sector,
                }
            })
            .collect()
    }

    /// Refreshes one cache entry. An empty result leaves the stored value untouched;
    /// only a failed upsert is reported as an error.
    pub async fn refresh_list(&self, key: &str, entries: &[TickerEntry]) -> Result<RefreshOutcome> {
        info!("Processing key: {} ({} tickers)", key, entries.len());

        let tickers: Vec<String> = entries.iter().map(|e| e.ticker.clone()).collect();
        let (seeds, batches) = self.fetch_in_batches(&tickers).await;
        let records = self.reclassify(seeds);

        let mut outcome = RefreshOutcome {
            key: key.to_string(),
            requested: tickers.len(),
            fetched: records.len(),
            batches,
            stored: false,
        };

        if records.is_empty() {
            warn!("No usable data fetched for key {}, keeping previous cache entry", key);
            return Ok(outcome);
        }

        let value = serde_json::to_value(&records).context("Failed to serialize stock records")?;
        self.store
            .upsert(key, value)
            .await
            .with_context(|| format!("Failed to save cache entry {}", key))?;

        info!("SUCCESS: Cached {} stocks for key: {}", records.len(), key);
        outcome.stored = true;
        Ok(outcome)
    }

    /// Rebuilds the homepage list and every sector list, one key at a time.
    pub async fn populate_all(&self) -> WarmupReport {
        let started_at = Utc::now();
        info!("-> Task: Updating ALL stock data caches...");

        let mut jobs: Vec<(String, Vec<TickerEntry>)> = Vec::with_capacity(self.catalog.sectors().len() + 1);
        jobs.push((HOMEPAGE_KEY.to_string(), self.catalog.homepage_entries()));
        for sector in self.catalog.sectors() {
            jobs.push((sector_cache_key(&sector.key), sector.tickers.clone()));
        }

        let mut report = WarmupReport {
            started_at,
            elapsed_ms: 0,
            refreshed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for (key, entries) in jobs {
            match self.refresh_list(&key, &entries).await {
                Ok(outcome) if outcome.stored => report.refreshed.push(key),
                Ok(_) => report.skipped.push(key),
                Err(e) => {
                    error!("ERROR saving cache for key {}: {:#}", key, e);
                    report.failed.push(key);
                }
            }
        }

        report.elapsed_ms = (Utc::now() - started_at).num_milliseconds();
        report
    }
}

fn parse_payload<T: DeserializeOwned>(raw: Payload) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(raw))?)
}

/// Runs a full population in the background; the outcome is only logged.
pub fn spawn_warmup(pipeline: Arc<RefreshPipeline>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run_warmup(&pipeline).await;
    })
}

pub async fn run_warmup(pipeline: &RefreshPipeline) -> WarmupReport {
    info!("WARMUP TRIGGERED! Starting to pre-populate all caches.");
    let report = pipeline.populate_all().await;
    if report.failed.is_empty() {
        info!(
            "WARMUP FINISHED in {} ms: {} refreshed, {} skipped",
            report.elapsed_ms,
            report.refreshed.len(),
            report.skipped.len()
        );
    } else {
        error!(
            "WARMUP FINISHED WITH ERRORS in {} ms: failed keys {:?}",
            report.elapsed_ms, report.failed
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{CountingStore, FakeProvider};
    use serde_json::json;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_json_str(
                r#"{
                    "sectors": [
                        { "key": "Tech", "tickers": [
                            { "ticker": "AAPL", "name_zh": "苹果" },
                            { "ticker": "MSFT", "name_zh": "微软" }
                        ] },
                        { "key": "Energy", "tickers": [ { "ticker": "XOM" } ] }
                    ],
                    "sector_labels": { "Tech": "Technology" }
                }"#,
            )
            .unwrap(),
        )
    }

    fn pipeline(provider: FakeProvider, store: Arc<CountingStore>, settings: RefreshSettings) -> RefreshPipeline {
        RefreshPipeline::new(Arc::new(provider), store, catalog(), settings)
    }

    fn no_delay(batch_size: usize) -> RefreshSettings {
        RefreshSettings {
            batch_size,
            batch_delay: Duration::ZERO,
        }
    }

    fn entries(tickers: &[&str]) -> Vec<TickerEntry> {
        tickers.iter().map(|t| TickerEntry::new(*t)).collect()
    }

    #[tokio::test]
    async fn stores_reclassified_records() {
        let provider = FakeProvider::new()
            .with_stock("AAPL", 3_000_000.0, 1.25, "Apple Inc")
            .with_stock("MSFT", 2_800_000.0, -0.5, "Microsoft Corp");
        let store = Arc::new(CountingStore::new());
        let pipeline = pipeline(provider, store.clone(), no_delay(20));

        let outcome = pipeline
            .refresh_list(&sector_cache_key("Tech"), &entries(&["AAPL", "MSFT"]))
            .await
            .unwrap();
        assert!(outcome.stored);
        assert_eq!(outcome.fetched, 2);

        let cached = store.get("sector_Tech").await.unwrap().unwrap();
        assert_eq!(
            cached,
            json!([
                { "ticker": "AAPL", "market_cap": 3_000_000.0, "change_percent": 1.25,
                  "name_zh": "苹果", "sector": "Technology", "original_sector": "Tech" },
                { "ticker": "MSFT", "market_cap": 2_800_000.0, "change_percent": -0.5,
                  "name_zh": "微软", "sector": "Technology", "original_sector": "Tech" }
            ])
        );
    }

    #[tokio::test]
    async fn unknown_tickers_fall_into_other_with_provider_name() {
        let provider = FakeProvider::new()
            .with_stock("XOM", 450_000.0, 0.3, "Exxon Mobil Corp")
            .with_stock("TSLA", 700_000.0, 4.0, "Tesla Inc");
        let store = Arc::new(CountingStore::new());
        let pipeline = pipeline(provider, store.clone(), no_delay(20));

        pipeline.refresh_list("mixed", &entries(&["XOM", "TSLA"])).await.unwrap();

        let cached: Vec<StockRecord> =
            serde_json::from_value(store.get("mixed").await.unwrap().unwrap()).unwrap();
        assert_eq!(cached[0].sector, "Energy");
        assert_eq!(cached[0].original_sector, "Energy");
        assert_eq!(cached[0].name_zh, "Exxon Mobil Corp");
        assert_eq!(cached[1].sector, "Other");
        assert_eq!(cached[1].original_sector, "Other");
    }

    #[tokio::test]
    async fn drops_zero_or_missing_market_cap_and_missing_change() {
        let provider = FakeProvider::new()
            .with_stock("AAPL", 3_000_000.0, 1.0, "Apple Inc")
            .with_stock("ZERO", 0.0, 1.0, "Delisted")
            .with_quote("NOCAP", json!({ "dp": 2.0 }))
            .with_profile("NOCAP", json!({ "name": "No Cap" }))
            .with_quote("NODP", json!({ "c": 0, "dp": null }))
            .with_profile("NODP", json!({ "marketCapitalization": 10.0, "name": "No Change" }))
            .with_stock("BROKEN", 5.0, 1.0, "Broken")
            .failing_profile("BROKEN", "500 Internal Server Error");
        let store = Arc::new(CountingStore::new());
        let pipeline = pipeline(provider, store.clone(), no_delay(2));

        let outcome = pipeline
            .refresh_list("homepage", &entries(&["ZERO", "AAPL", "NOCAP", "NODP", "BROKEN", "GHOST"]))
            .await
            .unwrap();
        assert_eq!(outcome.requested, 6);
        assert_eq!(outcome.fetched, 1);
        assert_eq!(outcome.batches, 3);

        let cached: Vec<StockRecord> =
            serde_json::from_value(store.get("homepage").await.unwrap().unwrap()).unwrap();
        let tickers: Vec<&str> = cached.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL"]);
    }

    #[tokio::test]
    async fn blank_or_mistyped_profile_fields() {
        let provider = FakeProvider::new()
            .with_stock("NVDA", 1_200_000.0, 3.5, "")
            .with_quote("TEXT", json!({ "dp": 1.0 }))
            .with_profile("TEXT", json!({ "marketCapitalization": "12.5", "name": "Text Cap" }));
        let store = Arc::new(CountingStore::new());
        let pipeline = pipeline(provider, store.clone(), no_delay(20));

        let outcome = pipeline.refresh_list("mixed", &entries(&["NVDA", "TEXT"])).await.unwrap();
        assert_eq!(outcome.fetched, 1);

        let cached: Vec<StockRecord> =
            serde_json::from_value(store.get("mixed").await.unwrap().unwrap()).unwrap();
        assert_eq!(cached[0].ticker, "NVDA");
        assert_eq!(cached[0].name_zh, "NVDA");
    }

    #[tokio::test]
    async fn empty_result_keeps_previous_value() {
        let store = Arc::new(CountingStore::new());
        store.upsert("sector_Tech", json!([{ "ticker": "OLD" }])).await.unwrap();
        let pipeline = pipeline(FakeProvider::new(), store.clone(), no_delay(20));

        let outcome = pipeline
            .refresh_list("sector_Tech", &entries(&["AAPL", "MSFT"]))
            .await
            .unwrap();

        assert!(!outcome.stored);
        assert_eq!(store.write_count(), 1);
        assert_eq!(
            store.get("sector_Tech").await.unwrap(),
            Some(json!([{ "ticker": "OLD" }]))
        );
    }

    #[tokio::test]
    async fn upsert_failure_is_returned() {
        let provider = FakeProvider::new().with_stock("AAPL", 1.0, 1.0, "Apple Inc");
        let store = Arc::new(CountingStore::failing_writes());
        let pipeline = pipeline(provider, store, no_delay(20));

        let err = pipeline.refresh_list("homepage", &entries(&["AAPL"])).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to save cache entry homepage"));
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_only_between_batches() {
        let delay = Duration::from_millis(1500);
        for (count, batch_size, expected_pauses) in [(45usize, 20usize, 2u32), (40, 20, 1), (1, 20, 0), (0, 20, 0)] {
            let tickers: Vec<String> = (0..count).map(|i| format!("T{}", i)).collect();
            let provider = tickers
                .iter()
                .fold(FakeProvider::new(), |p, t| p.with_stock(t, 1.0, 0.1, t));
            let pipeline = pipeline(
                provider,
                Arc::new(CountingStore::new()),
                RefreshSettings { batch_size, batch_delay: delay },
            );

            let list: Vec<TickerEntry> = tickers.iter().map(|t| TickerEntry::new(t.as_str())).collect();
            let start = tokio::time::Instant::now();
            let outcome = pipeline.refresh_list("load", &list).await.unwrap();

            assert_eq!(outcome.batches, count.div_ceil(batch_size));
            assert_eq!(start.elapsed(), delay * expected_pauses, "{} tickers", count);
        }
    }

    #[tokio::test]
    async fn populate_all_writes_homepage_and_every_sector() {
        let provider = FakeProvider::new()
            .with_stock("AAPL", 3.0, 1.0, "Apple Inc")
            .with_stock("MSFT", 2.0, 1.0, "Microsoft Corp");
        let store = Arc::new(CountingStore::new());
        let pipeline = pipeline(provider, store.clone(), no_delay(20));

        let report = pipeline.populate_all().await;

        assert_eq!(report.refreshed, vec!["homepage", "sector_Tech"]);
        assert_eq!(report.skipped, vec!["sector_Energy"]);
        assert!(report.failed.is_empty());
        assert!(store.get("sector_Energy").await.unwrap().is_none());

        let homepage = store.get("homepage").await.unwrap().unwrap();
        assert_eq!(homepage.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn populate_all_continues_after_store_failure() {
        let provider = FakeProvider::new()
            .with_stock("AAPL", 3.0, 1.0, "Apple Inc")
            .with_stock("XOM", 2.0, 1.0, "Exxon Mobil Corp");
        let store = Arc::new(CountingStore::failing_writes());
        let pipeline = pipeline(provider, store.clone(), no_delay(20));

        let report = pipeline.populate_all().await;

        assert_eq!(report.failed, vec!["homepage", "sector_Tech", "sector_Energy"]);
        assert_eq!(store.write_count(), 3);
    }
}
