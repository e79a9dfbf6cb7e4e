// src/services/mod.rs
pub mod cache_store;
pub mod catalog;
pub mod config;
pub mod finnhub;
pub mod refresh;
pub mod scheduler;
pub mod stock_detail;

#[cfg(test)]
pub(crate) mod testing;
