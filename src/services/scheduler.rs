// src/services/scheduler.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::services::refresh::{run_warmup, RefreshPipeline};

/// Registers a cron job running the full warmup. Keep the returned scheduler alive.
pub async fn start_warmup_schedule(cron: &str, pipeline: Arc<RefreshPipeline>) -> Result<JobScheduler> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = pipeline.clone();
        Box::pin(async move {
            info!("Scheduled warmup firing");
            run_warmup(&pipeline).await;
        })
    })
    .with_context(|| format!("Invalid WARMUP_CRON expression '{}'", cron))?;

    let scheduler = JobScheduler::new()
        .await
        .context("Failed to create warmup scheduler")?;

    scheduler.add(job).await.context("Failed to register warmup job")?;
    scheduler.start().await.context("Failed to start warmup scheduler")?;

    info!("Scheduled warmup registered with cron '{}'", cron);
    Ok(scheduler)
}
