// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::handlers::error::GatewayError;
use crate::handlers::gateway::{self, Gateway};

// Turn surviving rejections into a JSON error body
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(gateway_error) = err.find::<GatewayError>() {
        code = gateway_error.status;
        message = gateway_error.message.clone();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

/// Every request the gateway receives flows through the single interception
/// handler; classification happens there, not in the filter tree.
pub fn routes(
    gateway: Arc<Gateway>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring gateway routes...");

    let gateway_filter = warp::any().map(move || gateway.clone());

    warp::any()
        .and(warp::method())
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::header::optional::<String>("accept"))
        .and(warp::body::bytes())
        .and(gateway_filter)
        .and_then(gateway::handle_request)
        .recover(handle_rejection)
}

fn raw_query() -> impl Filter<Extract = (Option<String>,), Error = Infallible> + Clone {
    warp::query::raw()
        .map(Some)
        .or_else(|_| async { Ok::<(Option<String>,), Infallible>((None,)) })
}
