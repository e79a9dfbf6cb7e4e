use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use warp::Filter;

use stock_heatmap_backend::app::build_context;
use stock_heatmap_backend::handlers::warmup::WARMUP_SECRET_HEADER;
use stock_heatmap_backend::routes;
use stock_heatmap_backend::services::config::Config;
use stock_heatmap_backend::services::scheduler::start_warmup_schedule;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = Config::from_env()?;
    info!("Using PORT: {}", config.port);

    let ctx = build_context(&config)?;

    // Held for the lifetime of the server
    let _scheduler = match &config.warmup_cron {
        Some(cron) => Some(start_warmup_schedule(cron, ctx.pipeline.clone()).await?),
        None => None,
    };

    // Bind to 0.0.0.0 for container hosts
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", WARMUP_SECRET_HEADER])
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(ctx).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
