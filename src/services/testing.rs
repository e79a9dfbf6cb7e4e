// src/services/testing.rs
//! Scripted provider and counting store shared by unit tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::cache_store::{CacheStore, MemoryStore};
use super::finnhub::{MarketDataProvider, Payload};

#[derive(Default)]
pub struct FakeProvider {
    quotes: HashMap<String, Result<Value, String>>,
    profiles: HashMap<String, Result<Value, String>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ticker whose quote and profile both succeed.
    pub fn with_stock(mut self, ticker: &str, market_cap: f64, dp: f64, name: &str) -> Self {
        self.quotes.insert(ticker.to_string(), Ok(json!({ "c": 100.0, "dp": dp })));
        self.profiles.insert(
            ticker.to_string(),
            Ok(json!({ "marketCapitalization": market_cap, "name": name, "ticker": ticker })),
        );
        self
    }

    pub fn with_quote(mut self, ticker: &str, quote: Value) -> Self {
        self.quotes.insert(ticker.to_string(), Ok(quote));
        self
    }

    pub fn with_profile(mut self, ticker: &str, profile: Value) -> Self {
        self.profiles.insert(ticker.to_string(), Ok(profile));
        self
    }

    pub fn failing_profile(mut self, ticker: &str, message: &str) -> Self {
        self.profiles.insert(ticker.to_string(), Err(message.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, table: &HashMap<String, Result<Value, String>>, ticker: &str) -> Result<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match table.get(ticker) {
            Some(Ok(Value::Object(fields))) => Ok(fields.clone()),
            Some(Ok(other)) => Err(anyhow!("expected a JSON object, got {}", other)),
            Some(Err(message)) => Err(anyhow!(message.clone())),
            None => Err(anyhow!("404 Not Found for {}", ticker)),
        }
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn quote(&self, ticker: &str) -> Result<Payload> {
        self.lookup(&self.quotes, ticker)
    }

    async fn profile(&self, ticker: &str) -> Result<Payload> {
        self.lookup(&self.profiles, ticker)
    }
}

/// Memory store that counts reads and writes and can be told to fail writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_writes: bool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_writes() -> Self {
        CountingStore {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn upsert(&self, key: &str, value: Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(anyhow!("upsert rejected for {}", key));
        }
        self.inner.upsert(key, value).await
    }
}
