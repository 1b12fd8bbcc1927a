pub mod travels;
pub mod users;

use std::time::Duration;

use axum::{http::HeaderValue, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::warn;

use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allow_origin);
    Router::new()
        .nest("/users", users::router())
        .nest("/travels", travels::router())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allow_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_origin == "*" {
        return layer.allow_origin(Any);
    }
    match allow_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(err) => {
            warn!("invalid CORS_ALLOW_ORIGIN {allow_origin:?} ({err}), allowing any origin");
            layer.allow_origin(Any)
        }
    }
}
