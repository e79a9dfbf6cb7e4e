// src/routes.rs
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::stocks::get_stocks;
use crate::handlers::warmup::{trigger_warmup, WARMUP_SECRET_HEADER};
use crate::handlers::AppContext;

// Every rejection leaves as `{ "error": ... }` JSON
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found";
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.as_str();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed";
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query string";
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error";
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(ctx: Arc<AppContext>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let ctx_filter = warp::any().map(move || ctx.clone());

    let stocks_route = warp::path!("api" / "stocks")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(ctx_filter.clone())
        .and_then(get_stocks);

    let warmup_route = warp::path!("api" / "warmup")
        .and(warp::get().or(warp::post()).unify())
        .and(warp::header::optional::<String>(WARMUP_SECRET_HEADER))
        .and(ctx_filter.clone())
        .and_then(trigger_warmup);

    info!("All routes configured successfully.");

    stocks_route
        .or(warmup_route)
        .recover(handle_rejection)
}
