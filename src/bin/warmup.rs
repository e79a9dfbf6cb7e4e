// src/bin/warmup.rs
use dotenv::dotenv;
use log::{error, info};

use stock_heatmap_backend::app::build_context;
use stock_heatmap_backend::services::config::Config;
use stock_heatmap_backend::services::refresh::run_warmup;

/// Runs one full cache warmup in the foreground.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    let ctx = build_context(&config)?;

    info!(
        "Warming {} sectors with batch size {} and {:?} between batches",
        ctx.catalog.sectors().len(),
        config.refresh.batch_size,
        config.refresh.batch_delay
    );

    let report = run_warmup(&ctx.pipeline).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.failed.is_empty() {
        error!("Failed keys: {:?}", report.failed);
        anyhow::bail!("{} cache entries could not be saved", report.failed.len());
    }
    Ok(())
}
