// src/handlers/warmup.rs
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use super::error::ApiError;
use super::AppContext;
use crate::services::refresh::spawn_warmup;

pub const WARMUP_SECRET_HEADER: &str = "x-warmup-secret";

/// `GET|POST /api/warmup`: answers 202 at once and repopulates the cache in the background.
pub async fn trigger_warmup(
    secret: Option<String>,
    ctx: Arc<AppContext>,
) -> Result<Response, Rejection> {
    let authorized = match (&ctx.warmup_secret, &secret) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if !authorized {
        warn!("Rejected warmup request with missing or wrong secret");
        return Err(warp::reject::custom(ApiError::unauthorized()));
    }

    info!("MANUAL WARMUP TRIGGERED!");
    // detached: the response does not wait for the population to finish
    spawn_warmup(ctx.pipeline.clone());

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "message": "Cache warmup process started. This will take several minutes. Check server logs for progress."
        })),
        StatusCode::ACCEPTED,
    )
    .into_response())
}
